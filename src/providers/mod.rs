//! Clients for hosted OpenAI-compatible chat-completion providers
//!
//! One [`ProviderClient`] serves any provider speaking the chat-completions
//! dialect; which vendor it talks to is entirely a matter of configuration
//! (base URL, model, API key). Streaming lives in [`streaming`].

pub mod streaming;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::error::{AppError, AppResult};

/// Upper bound on captured error-body text in provider errors
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

/// Errors from a single provider call
///
/// These stay internal to the dispatch layer; the dispatcher decides which of
/// them trigger fallback and which surface as typed `AppError`s.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {provider} rate limited the request")]
    RateLimited { provider: String },

    #[error("provider {provider} timed out after {timeout_seconds} seconds")]
    Timeout {
        provider: String,
        timeout_seconds: u64,
    },

    #[error("provider {provider} request failed: {source}")]
    RequestFailed {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider {provider} returned status {status}: {body}")]
    UnexpectedStatus {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("provider {provider} returned an error: {message}")]
    ApiError { provider: String, message: String },

    #[error("provider {provider} returned an empty completion")]
    EmptyResponse { provider: String },

    #[error("provider {provider} returned an unparseable response: {reason}")]
    MalformedResponse { provider: String, reason: String },
}

/// Chat message in the completions wire format
#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// Chat-completions request body
#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, system: &'a str, user: &'a str, stream: Option<bool>) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream,
        }
    }
}

/// Chat-completions response body
///
/// Tolerant shape: some vendors report errors inside a 200 body instead of an
/// HTTP error status, so both `choices` and `error` are optional.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for one configured provider
///
/// Every request carries a bounded total timeout. Does not derive Debug; the
/// struct holds an API key.
pub struct ProviderClient {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    timeout_seconds: u64,
    http: reqwest::Client,
}

impl ProviderClient {
    /// Build a client from provider configuration.
    ///
    /// Resolves the API key from the environment variable named in the
    /// config. A named but unset variable is a startup error; a provider
    /// without `api_key_env` sends no Authorization header.
    pub fn from_config(config: &ProviderConfig) -> AppResult<Self> {
        let api_key = resolve_api_key(config)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .build()
            .map_err(|e| {
                AppError::Config(format!(
                    "failed to build HTTP client for provider '{}': {}",
                    config.name(),
                    e
                ))
            })?;

        Ok(Self {
            name: config.name().to_string(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            api_key,
            timeout_seconds: config.timeout_seconds(),
            http,
        })
    }

    /// Get the provider name (used in logs and error messages)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the model identifier this client sends
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat-completion request and return the reply text.
    ///
    /// A 429 status or a numeric `error.code == 429` inside a 200 body both
    /// surface as [`ProviderError::RateLimited`] so the dispatcher can treat
    /// them identically.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest::new(&self.model, system_prompt, user_prompt, None);

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited {
                provider: self.name.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::UnexpectedStatus {
                provider: self.name.clone(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: self.name.clone(),
                    reason: e.to_string(),
                })?;

        extract_content(&self.name, parsed)
    }

    fn transport_error(&self, source: reqwest::Error) -> ProviderError {
        if source.is_timeout() {
            ProviderError::Timeout {
                provider: self.name.clone(),
                timeout_seconds: self.timeout_seconds,
            }
        } else {
            ProviderError::RequestFailed {
                provider: self.name.clone(),
                source,
            }
        }
    }
}

/// Resolve a provider's API key from its configured environment variable
pub(crate) fn resolve_api_key(config: &ProviderConfig) -> AppResult<Option<SecretString>> {
    match config.api_key_env() {
        Some(var) => match std::env::var(var) {
            Ok(value) => Ok(Some(SecretString::from(value))),
            Err(_) => Err(AppError::Config(format!(
                "provider '{}' names api_key_env '{}' but the variable is not set",
                config.name(),
                var
            ))),
        },
        None => Ok(None),
    }
}

/// Pull the reply text out of a parsed completion body
fn extract_content(provider: &str, body: CompletionResponse) -> Result<String, ProviderError> {
    if let Some(error) = body.error {
        if error.code == Some(429) {
            return Err(ProviderError::RateLimited {
                provider: provider.to_string(),
            });
        }
        return Err(ProviderError::ApiError {
            provider: provider.to_string(),
            message: error
                .message
                .unwrap_or_else(|| "unspecified provider error".to_string()),
        });
    }

    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content);

    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::EmptyResponse {
            provider: provider.to_string(),
        }),
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect()
}
