//! Streaming dispatch against the primary provider
//!
//! Streaming is single-attempt: there is no fallback chain and no sticky
//! binding involvement. Each call owns its own upstream connection, so
//! dropping the returned stream (client disconnect) cancels the provider
//! request.

use crate::config::{AssistantConfig, Config};
use crate::error::{AppError, AppResult};
use crate::providers::ProviderError;
use crate::providers::streaming::{DeltaStream, StreamingClient};

/// Opens streaming completions on the primary provider
pub struct StreamingDispatcher {
    primary: StreamingClient,
    assistant: AssistantConfig,
}

impl StreamingDispatcher {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self {
            primary: StreamingClient::from_config(&config.providers.primary)?,
            assistant: config.assistant.clone(),
        })
    }

    /// Open a streaming completion for `prompt`.
    ///
    /// The system prompt is built the same way as for non-streaming dispatch.
    /// Failures to open the stream surface as typed errors; once deltas are
    /// flowing, the stream ends silently on provider-side trouble.
    pub async fn open(&self, prompt: &str, language: &str) -> AppResult<DeltaStream> {
        let system_prompt = self.assistant.system_prompt_for(prompt, language);
        self.primary
            .open(&system_prompt, prompt)
            .await
            .map_err(|e| self.open_error(e))
    }

    fn open_error(&self, error: ProviderError) -> AppError {
        match error {
            ProviderError::Timeout {
                provider,
                timeout_seconds,
            } => AppError::ProviderTimeout {
                provider,
                timeout_seconds,
            },
            other => AppError::ProviderQueryFailed {
                provider: self.primary.name().to_string(),
                reason: other.to_string(),
            },
        }
    }
}
