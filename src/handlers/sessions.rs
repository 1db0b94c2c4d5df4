//! Session listing endpoint handler

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::AppState;
use crate::storage::SessionSummary;

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    user_id: String,
}

/// GET /sessions handler
///
/// Returns all of a user's sessions as a bare array, newest first.
pub async fn handler(
    State(state): State<AppState>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    let user_id = query.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".to_string()));
    }

    let sessions = state.store().sessions_for_user(user_id).await?;
    Ok(Json(sessions))
}
