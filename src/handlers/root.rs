//! Root endpoint handler

use axum::{Json, extract::State};
use serde::Serialize;

use crate::handlers::AppState;

/// Welcome response
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    /// Welcome message built from the configured project name
    pub msg: String,
}

/// GET / handler
pub async fn handler(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        msg: state.config().assistant.welcome_message(),
    })
}
