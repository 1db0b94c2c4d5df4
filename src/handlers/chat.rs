//! Chat endpoint handler
//!
//! Handles POST /chat: language detection, provider dispatch with fallback,
//! HTML formatting, and persistence of the completed turn.

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::format::format_reply;
use crate::handlers::{AppState, ValidatedJson};
use crate::middleware::RequestId;
use crate::storage::ChatTurn;

/// Maximum allowed prompt length in characters (32K chars)
const MAX_PROMPT_LENGTH: usize = 32_000;

/// Chat request from client
///
/// Validation is enforced during deserialization - invalid instances cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    prompt: String,
    language: String,
    session_id: String,
    user_id: String,
    model: Option<String>,
}

impl ChatRequest {
    /// Get the prompt (trimmed)
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Get the requested reply language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get the session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the user id
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the requested model, if any
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

/// Custom Deserialize implementation that validates during deserialization
impl<'de> Deserialize<'de> for ChatRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawChatRequest {
            prompt: String,
            #[serde(default)]
            language: Option<String>,
            session_id: String,
            user_id: String,
            #[serde(default)]
            model: Option<String>,
        }

        let raw = RawChatRequest::deserialize(deserializer)?;

        let prompt = raw.prompt.trim();
        if prompt.is_empty() {
            return Err(serde::de::Error::custom(
                "prompt cannot be empty or contain only whitespace",
            ));
        }

        // Count Unicode characters, not bytes
        let char_count = prompt.chars().count();
        if char_count > MAX_PROMPT_LENGTH {
            return Err(serde::de::Error::custom(format!(
                "prompt exceeds maximum length of {} characters (got {})",
                MAX_PROMPT_LENGTH, char_count
            )));
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

        if raw.session_id.trim().is_empty() {
            return Err(serde::de::Error::custom("session_id cannot be empty"));
        }
        if raw.user_id.trim().is_empty() {
            return Err(serde::de::Error::custom("user_id cannot be empty"));
        }

        Ok(ChatRequest {
            prompt: prompt.to_string(),
            language,
            session_id: raw.session_id.trim().to_string(),
            user_id: raw.user_id.trim().to_string(),
            model: raw.model.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
        })
    }
}

/// Chat response to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    response: String,
}

impl ChatResponse {
    pub fn new(response: String) -> Self {
        Self { response }
    }

    /// Get the formatted reply HTML
    pub fn response(&self) -> &str {
        &self.response
    }
}

/// POST /chat handler
///
/// The full turn pipeline: detect the prompt's language, normalize it to
/// English for the providers when it differs from the requested language,
/// dispatch with fallback, translate the reply back, format it as HTML, and
/// persist the turn. Persistence runs before the response; its failure fails
/// the request.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(
        request_id = %request_id,
        session_id = request.session_id(),
        prompt_length = request.prompt().len(),
        language = request.language(),
        "Received chat request"
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

    let outcome = state
        .dispatcher()
        .dispatch(
            request.session_id(),
            &translated_prompt,
            request.language(),
            request.model(),
        )
        .await?;

    let provider = outcome
        .provider()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "canned".to_string());
    tracing::info!(
        request_id = %request_id,
        session_id = request.session_id(),
        provider = %provider,
        fell_back = outcome.fell_back(),
        detected_language = %detected,
        "Dispatch complete"
    );

    let reply = outcome.into_text();
    let llm_response = if request.language() == "en" || detected == request.language() {
        reply
    } else {
        state.language().translate(&reply, request.language()).await
    };

    let final_response = format_reply(&llm_response);

    let turn = ChatTurn {
        session_id: request.session_id().to_string(),
        user_id: request.user_id().to_string(),
        user_prompt: request.prompt().to_string(),
        translated_prompt,
        llm_response,
        final_response: final_response.clone(),
        language: request.language().to_string(),
    };
    state.store().save_turn(&turn).await?;

    tracing::debug!(
        request_id = %request_id,
        session_id = request.session_id(),
        "Chat turn persisted"
    );

    Ok(Json(ChatResponse::new(final_response)))
}
