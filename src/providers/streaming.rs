//! Streaming variant of the provider client
//!
//! Opens a chat-completion request with `stream: true` and decodes the
//! provider's SSE frames into plain text deltas. The HTTP client here bounds
//! connection establishment only; a healthy stream may run as long as the
//! provider keeps sending.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::error::{AppError, AppResult};
use crate::providers::{CompletionRequest, ProviderError, resolve_api_key};

/// Decoded text deltas from one streaming completion
pub type DeltaStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// One SSE frame of a streaming completion
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl StreamChunk {
    fn delta_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
    }
}

/// Streaming client for one configured provider
///
/// Does not derive Debug; the struct holds an API key.
pub struct StreamingClient {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    timeout_seconds: u64,
    http: reqwest::Client,
}

impl StreamingClient {
    /// Build a streaming client from provider configuration.
    ///
    /// The configured timeout bounds connection establishment, not total
    /// stream duration.
    pub fn from_config(config: &ProviderConfig) -> AppResult<Self> {
        let api_key = resolve_api_key(config)?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds()))
            .build()
            .map_err(|e| {
                AppError::Config(format!(
                    "failed to build streaming HTTP client for provider '{}': {}",
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

    /// Open a streaming completion and return its decoded delta stream.
    ///
    /// The initial response status is checked before any byte is forwarded:
    /// a 429 or other non-success status is a typed error. Once the stream is
    /// open, malformed frames are skipped and a mid-stream transport failure
    /// simply ends the stream.
    pub async fn open(&self, system_prompt: &str, user_prompt: &str) -> Result<DeltaStream, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest::new(&self.model, system_prompt, user_prompt, Some(true));

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    provider: self.name.clone(),
                    timeout_seconds: self.timeout_seconds,
                }
            } else {
                ProviderError::RequestFailed {
                    provider: self.name.clone(),
                    source: e,
                }
            }
        })?;

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
                body: super::truncate_body(&body),
            });
        }

        Ok(delta_stream(self.name.clone(), response.bytes_stream()))
    }
}

/// Decode an SSE byte stream into text deltas.
///
/// Frames arrive as `data: {json}` lines terminated by `data: [DONE]`.
/// Bytes are buffered until a full line is available, so frames split
/// across transport chunks decode intact.
fn delta_stream<S, B, E>(provider: String, byte_stream: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let stream = async_stream::stream! {
        futures::pin_mut!(byte_stream);
        let mut pending: Vec<u8> = Vec::new();

        while let Some(next) = byte_stream.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        error = %e,
                        "Transport error mid-stream, ending delta stream"
                    );
                    return;
                }
            };
            pending.extend_from_slice(chunk.as_ref());

            while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = pending.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line_bytes);
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    return;
                }

                match serde_json::from_str::<StreamChunk>(data) {
                    Ok(frame) => {
                        if let Some(delta) = frame.delta_content() {
                            if !delta.is_empty() {
                                yield delta;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::debug!(
                            provider = %provider,
                            error = %e,
                            "Skipping malformed stream frame"
                        );
                    }
                }
            }
        }
    };

    Box::pin(stream)
}
