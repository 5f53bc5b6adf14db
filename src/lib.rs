pub mod hub;

mod appresult;

pub use appresult::{AppError, AppResult};

use axum::extract::FromRef;

use crate::hub::HubHandle;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub hub: HubHandle,
}
