//! Error types for chatrelay
//!
//! All errors implement `IntoResponse` for Axum handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unknown model '{model}': no provider is configured to serve it")]
    UnknownModel { model: String },

    #[error("Provider {provider} request failed: {reason}")]
    ProviderQueryFailed { provider: String, reason: String },

    #[error("Provider chain exhausted, last error from {provider}: {reason}")]
    ProvidersExhausted { provider: String, reason: String },

    #[error("Request to provider {provider} timed out after {timeout_seconds} seconds")]
    ProviderTimeout {
        provider: String,
        timeout_seconds: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::UnknownModel { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            Self::ProviderQueryFailed { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            Self::ProvidersExhausted { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            Self::ProviderTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            Self::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
