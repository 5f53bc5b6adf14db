mod actor;
mod admission;
mod envelope;
mod presence;
mod registry;
mod ws;

pub use actor::HubHandle;
pub use admission::{Admission, NAME_TAKEN};
pub use envelope::{ClientEvent, Role, ServerEvent, unix_millis};
pub use registry::{ConnectionId, EventSender, PresenceRecord};

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::chat_ws))
        .route("/{room_id}/presence", get(presence::room_presence))
}
