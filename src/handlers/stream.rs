//! Streaming chat endpoint handler
//!
//! Handles POST /chat/stream: opens a single-attempt stream on the primary
//! provider and forwards text deltas as a `text/plain` chunked body. Nothing
//! is persisted; dropping the response body cancels the upstream call.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::header;
use axum::{Extension, extract::State, response::IntoResponse};
use futures::StreamExt;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::handlers::{AppState, ValidatedJson};
use crate::middleware::RequestId;

/// Maximum allowed prompt length in characters, shared with POST /chat
const MAX_PROMPT_LENGTH: usize = 32_000;

/// Streaming chat request from client
///
/// Validation is enforced during deserialization - invalid instances cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct StreamRequest {
    prompt: String,
    session_id: String,
    language: String,
}

impl StreamRequest {
    /// Get the prompt (trimmed)
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Get the session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the requested reply language
    pub fn language(&self) -> &str {
        &self.language
    }
}

/// Custom Deserialize implementation that validates during deserialization
impl<'de> Deserialize<'de> for StreamRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawStreamRequest {
            prompt: String,
            session_id: String,
            #[serde(default)]
            language: Option<String>,
        }

        let raw = RawStreamRequest::deserialize(deserializer)?;

        let prompt = raw.prompt.trim();
        if prompt.is_empty() {
            return Err(serde::de::Error::custom(
                "prompt cannot be empty or contain only whitespace",
            ));
        }
        let char_count = prompt.chars().count();
        if char_count > MAX_PROMPT_LENGTH {
            return Err(serde::de::Error::custom(format!(
                "prompt exceeds maximum length of {} characters (got {})",
                MAX_PROMPT_LENGTH, char_count
            )));
        }

        if raw.session_id.trim().is_empty() {
            return Err(serde::de::Error::custom("session_id cannot be empty"));
        }

        let language = match raw.language {
            None => "en".to_string(),
            Some(l) => {
                let trimmed = l.trim();
                if trimmed.is_empty() {
                    return Err(serde::de::Error::custom("language cannot be empty"));
                }
                trimmed.to_string()
            }
        };

        Ok(StreamRequest {
            prompt: prompt.to_string(),
            session_id: raw.session_id.trim().to_string(),
            language,
        })
    }
}

/// POST /chat/stream handler
///
/// Detection and prompt normalization match POST /chat. Each delta is
/// translated to the requested language under the same skip rule, blank
/// chunks are dropped, and the rest stream out as plain text. Errors are
/// typed only until the stream opens; after that the body just ends.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ValidatedJson(request): ValidatedJson<StreamRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(
        request_id = %request_id,
        session_id = request.session_id(),
        prompt_length = request.prompt().len(),
        language = request.language(),
        "Received streaming chat request"
    );

    let detected = state.language().detect_language(request.prompt()).await;

    let translated_prompt = if detected == request.language() {
        request.prompt().to_string()
    } else {
        state
            .language()
            .translate_detected(request.prompt(), &detected, "en")
            .await
    };

    let mut deltas = state
        .streaming()
        .open(&translated_prompt, request.language())
        .await?;

    tracing::info!(
        request_id = %request_id,
        session_id = request.session_id(),
        detected_language = %detected,
        "Streaming reply opened"
    );

    let translate_out = request.language() != "en" && detected != request.language();
    let language = request.language().to_string();
    let stream_state = state.clone();

    let body = async_stream::stream! {
        while let Some(delta) = deltas.next().await {
            let text = if translate_out {
                stream_state.language().translate(&delta, &language).await
            } else {
                delta
            };
            if text.is_empty() {
                continue;
            }
            yield Ok::<_, Infallible>(Bytes::from(text));
        }
    };

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    ))
}
