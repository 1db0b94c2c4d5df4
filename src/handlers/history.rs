//! Chat history endpoint handler

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::AppState;
use crate::storage::HistoryEntry;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    session_id: String,
}

/// History response to client
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    history: Vec<HistoryEntry>,
}

impl HistoryResponse {
    /// Get the history entries, newest first
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

/// GET /history handler
///
/// Returns the most recent turns for a session, newest first, capped at 10.
pub async fn handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let session_id = query.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::Validation("session_id cannot be empty".to_string()));
    }

    let history = state.store().recent_turns(session_id).await?;
    Ok(Json(HistoryResponse { history }))
}
