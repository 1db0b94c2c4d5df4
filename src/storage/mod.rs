//! Persistence for chat turns and session summaries
//!
//! Two tables: `chat_history` holds every request/response pair, append-only;
//! `chat_sessions` holds one summary row per session, created atomically on
//! the session's first turn and never touched again.

pub mod pool;

use chrono::Utc;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use pool::DatabasePool;

/// Maximum entries returned by [`ChatStore::recent_turns`]
const RECENT_TURNS_LIMIT: i64 = 10;

/// Session titles are the first prompt truncated to this many characters
const SESSION_TITLE_MAX_CHARS: usize = 50;

const UNTITLED_SESSION: &str = "Untitled Chat";

/// One completed request/response pair, ready to persist
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub session_id: String,
    pub user_id: String,
    pub user_prompt: String,
    pub translated_prompt: String,
    pub llm_response: String,
    pub final_response: String,
    pub language: String,
}

/// One history entry as served to clients
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub user: String,
    pub ai: String,
}

/// One session summary as served to clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    user_prompt: String,
    final_response: String,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    title: String,
    created_at: String,
}

/// Gateway for all chat persistence
#[derive(Clone)]
pub struct ChatStore {
    pool: DatabasePool,
}

impl ChatStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Persist one turn and ensure its session summary exists.
    ///
    /// The session upsert uses `ON CONFLICT(id) DO NOTHING`, so concurrent
    /// first turns of the same session still produce exactly one row. Both
    /// statements commit in one transaction.
    pub async fn save_turn(&self, turn: &ChatTurn) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let title = session_title(&turn.user_prompt);

        let mut tx = self.pool.writer.begin().await.map_err(storage_error)?;

        sqlx::query(
            "INSERT INTO chat_history \
             (session_id, user_id, user_prompt, translated_prompt, llm_response, final_response, language, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&turn.session_id)
        .bind(&turn.user_id)
        .bind(&turn.user_prompt)
        .bind(&turn.translated_prompt)
        .bind(&turn.llm_response)
        .bind(&turn.final_response)
        .bind(&turn.language)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, title, created_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&turn.session_id)
        .bind(&turn.user_id)
        .bind(&title)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    /// Fetch the most recent turns for a session, newest first.
    pub async fn recent_turns(&self, session_id: &str) -> AppResult<Vec<HistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT user_prompt, final_response FROM chat_history \
             WHERE session_id = ?1 \
             ORDER BY timestamp DESC, id DESC \
             LIMIT ?2",
        )
        .bind(session_id)
        .bind(RECENT_TURNS_LIMIT)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(storage_error)?;

        Ok(rows
            .into_iter()
            .map(|row| HistoryEntry {
                user: row.user_prompt,
                ai: row.final_response,
            })
            .collect())
    }

    /// Fetch all of a user's sessions, newest first.
    pub async fn sessions_for_user(&self, user_id: &str) -> AppResult<Vec<SessionSummary>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT id, title, created_at FROM chat_sessions \
             WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(storage_error)?;

        Ok(rows
            .into_iter()
            .map(|row| SessionSummary {
                id: row.id,
                title: row.title,
                created_at: row.created_at,
            })
            .collect())
    }
}

fn storage_error(source: sqlx::Error) -> AppError {
    AppError::Storage(source.to_string())
}

/// Derive a session title from its first prompt
fn session_title(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return UNTITLED_SESSION.to_string();
    }
    trimmed.chars().take(SESSION_TITLE_MAX_CHARS).collect()
}
