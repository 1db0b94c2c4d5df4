//! Language detection and translation against a hosted translate API
//!
//! The API is Google-Translate-v2 shaped. Detection and translation are both
//! best-effort: the service exists to localize chat, not to gate it, so every
//! failure here degrades to a sensible default instead of surfacing an error.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AssistantConfig, Config};
use crate::error::{AppError, AppResult};

/// Fallback language when detection is skipped or fails
const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Error)]
enum TranslationCallError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response carried no result")]
    EmptyResult,
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    data: DetectData,
}

#[derive(Debug, Deserialize)]
struct DetectData {
    #[serde(default)]
    detections: Vec<Vec<Detection>>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    language: String,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// Client for the hosted detection and translation endpoints
///
/// Does not derive Debug; the struct holds an API key.
pub struct LanguageService {
    base_url: String,
    api_key: Option<SecretString>,
    assistant: AssistantConfig,
    http: reqwest::Client,
}

impl LanguageService {
    /// Build the service from application configuration.
    ///
    /// A named but unset `api_key_env` variable is a startup error; without
    /// `api_key_env` requests carry no key (local stub servers ignore it).
    pub fn new(config: &Config) -> AppResult<Self> {
        let api_key = match config.translation.api_key_env.as_deref() {
            Some(var) => match std::env::var(var) {
                Ok(value) => Some(SecretString::from(value)),
                Err(_) => {
                    return Err(AppError::Config(format!(
                        "translation names api_key_env '{var}' but the variable is not set"
                    )));
                }
            },
            None => None,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.translation.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build translation HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.translation.base_url.trim_end_matches('/').to_string(),
            api_key,
            assistant: config.assistant.clone(),
            http,
        })
    }

    /// Detect the language of `text`, defaulting to English.
    ///
    /// Texts containing a configured greeting substring short-circuit to
    /// `"en"` without a network call; most chats open with one, and the
    /// detector is least reliable on short fragments. A heuristic, not a
    /// guarantee.
    pub async fn detect_language(&self, text: &str) -> String {
        if text.trim().is_empty() || self.assistant.is_greeting(text) {
            return DEFAULT_LANGUAGE.to_string();
        }

        match self.request_detection(text).await {
            Ok(language) => language,
            Err(e) => {
                tracing::warn!(error = %e, "Language detection failed, defaulting to English");
                DEFAULT_LANGUAGE.to_string()
            }
        }
    }

    /// Translate `text` into `target`, detecting the source language first.
    pub async fn translate(&self, text: &str, target: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        let source = self.detect_language(text).await;
        self.translate_detected(text, &source, target).await
    }

    /// Translate `text` from a known `source` language into `target`.
    ///
    /// Returns the input unchanged when source and target already match or
    /// when the hosted call fails; the caller always gets usable text.
    pub async fn translate_detected(&self, text: &str, source: &str, target: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        if source == target {
            return text.to_string();
        }

        match self.request_translation(text, target).await {
            Ok(translated) => translated,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    source = source,
                    target = target,
                    "Translation failed, returning original text"
                );
                text.to_string()
            }
        }
    }

    async fn request_detection(&self, text: &str) -> Result<String, TranslationCallError> {
        let url = format!("{}/language/translate/v2/detect", self.base_url);
        let response = self
            .authorized(self.http.post(&url).json(&DetectRequest { q: text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationCallError::Status(status.as_u16()));
        }

        let parsed: DetectResponse = response.json().await?;
        parsed
            .data
            .detections
            .into_iter()
            .flatten()
            .next()
            .map(|detection| detection.language)
            .ok_or(TranslationCallError::EmptyResult)
    }

    async fn request_translation(&self, text: &str, target: &str) -> Result<String, TranslationCallError> {
        let url = format!("{}/language/translate/v2", self.base_url);
        let body = TranslateRequest {
            q: text,
            target,
            format: "text",
        };
        let response = self.authorized(self.http.post(&url).json(&body)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationCallError::Status(status.as_u16()));
        }

        let parsed: TranslateResponse = response.json().await?;
        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|translation| translation.translated_text)
            .ok_or(TranslationCallError::EmptyResult)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("key", key.expose_secret())]),
            None => request,
        }
    }
}
