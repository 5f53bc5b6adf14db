use axum::{
    Json, debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AppResult;
use crate::hub::actor::HubHandle;
use crate::hub::envelope::unix_millis;

/// Who is in the room right now. Unknown rooms are simply empty, the hub
/// never checks a room directory.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_presence(
    State(hub): State<HubHandle>,
    Path(room_id): Path<String>,
) -> AppResult<Response> {
    let members = hub.presence(room_id).await?;
    let body: Vec<_> = members
        .iter()
        .map(|r| {
            json!({
                "displayName": r.display_name,
                "role": r.role,
                "joinedAt": unix_millis(r.joined_at),
            })
        })
        .collect();
    Ok(Json(body).into_response())
}
