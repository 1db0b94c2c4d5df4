//! Provider selection and fallback for chat completions
//!
//! The dispatcher runs a small state machine over the configured providers.
//! Sessions stick to the provider that last served them: a session pushed to
//! the secondary by a primary failure stays there for its lifetime, which
//! keeps conversations on one model instead of bouncing between vendors
//! per request. Bindings are process-local and lost on restart.

pub mod streaming;

use std::fmt;

use dashmap::DashMap;

use crate::config::{AssistantConfig, Config};
use crate::error::{AppError, AppResult};
use crate::providers::{ProviderClient, ProviderError};

/// Which configured provider served (or should serve) a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    Primary,
    Secondary,
    Tertiary,
}

impl fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderRole::Primary => "primary",
            ProviderRole::Secondary => "secondary",
            ProviderRole::Tertiary => "tertiary",
        };
        f.write_str(label)
    }
}

/// Result of a successful dispatch
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    text: String,
    provider: Option<ProviderRole>,
    fell_back: bool,
}

impl DispatchOutcome {
    /// Get the reply text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the outcome, returning the reply text
    pub fn into_text(self) -> String {
        self.text
    }

    /// Get the provider that answered; `None` for canned answers
    pub fn provider(&self) -> Option<ProviderRole> {
        self.provider
    }

    /// Whether this request fell back from primary to secondary
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }
}

/// Routes chat completions across the configured providers
pub struct ModelDispatcher {
    primary: ProviderClient,
    secondary: ProviderClient,
    tertiary: Option<ProviderClient>,
    assistant: AssistantConfig,
    bindings: DashMap<String, ProviderRole>,
}

impl ModelDispatcher {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self {
            primary: ProviderClient::from_config(&config.providers.primary)?,
            secondary: ProviderClient::from_config(&config.providers.secondary)?,
            tertiary: config
                .providers
                .tertiary
                .as_ref()
                .map(ProviderClient::from_config)
                .transpose()?,
            assistant: config.assistant.clone(),
            bindings: DashMap::new(),
        })
    }

    /// Dispatch one prompt and return the reply.
    ///
    /// Creator-identity questions are answered from configuration without a
    /// provider call. A request naming a model other than the primary's goes
    /// straight to the tertiary provider. Everything else starts at the
    /// session's sticky binding (primary for new sessions): a primary
    /// rate limit or transport failure rebinds the session to secondary and
    /// retries there; a secondary failure is terminal.
    pub async fn dispatch(
        &self,
        session_id: &str,
        prompt: &str,
        language: &str,
        requested_model: Option<&str>,
    ) -> AppResult<DispatchOutcome> {
        if self.assistant.is_creator_question(prompt) {
            tracing::debug!(session_id, "Answering creator question from configuration");
            return Ok(DispatchOutcome {
                text: self.assistant.creator_answer.clone(),
                provider: None,
                fell_back: false,
            });
        }

        if let Some(model) = requested_model {
            if model != self.primary.model() {
                return self.dispatch_foreign_model(session_id, prompt, language, model).await;
            }
        }

        let system_prompt = self.assistant.system_prompt_for(prompt, language);
        let entry = self.binding(session_id).unwrap_or(ProviderRole::Primary);

        if entry == ProviderRole::Primary {
            match self.primary.complete(&system_prompt, prompt).await {
                Ok(text) => {
                    self.bind(session_id, ProviderRole::Primary);
                    return Ok(DispatchOutcome {
                        text,
                        provider: Some(ProviderRole::Primary),
                        fell_back: false,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        session_id,
                        provider = self.primary.name(),
                        error = %e,
                        "Primary provider failed, falling back to secondary"
                    );
                    self.bind(session_id, ProviderRole::Secondary);
                }
            }
            return self.complete_on_secondary(session_id, &system_prompt, prompt, true).await;
        }

        self.complete_on_secondary(session_id, &system_prompt, prompt, false).await
    }

    /// Look up the sticky binding for a session.
    pub fn binding(&self, session_id: &str) -> Option<ProviderRole> {
        self.bindings.get(session_id).map(|entry| *entry.value())
    }

    async fn complete_on_secondary(
        &self,
        session_id: &str,
        system_prompt: &str,
        prompt: &str,
        fell_back: bool,
    ) -> AppResult<DispatchOutcome> {
        match self.secondary.complete(system_prompt, prompt).await {
            Ok(text) => {
                self.bind(session_id, ProviderRole::Secondary);
                Ok(DispatchOutcome {
                    text,
                    provider: Some(ProviderRole::Secondary),
                    fell_back,
                })
            }
            Err(ProviderError::Timeout {
                provider,
                timeout_seconds,
            }) => Err(AppError::ProviderTimeout {
                provider,
                timeout_seconds,
            }),
            Err(e) => Err(AppError::ProvidersExhausted {
                provider: self.secondary.name().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Single attempt against the tertiary provider, no binding updates.
    async fn dispatch_foreign_model(
        &self,
        session_id: &str,
        prompt: &str,
        language: &str,
        model: &str,
    ) -> AppResult<DispatchOutcome> {
        let Some(tertiary) = &self.tertiary else {
            return Err(AppError::UnknownModel {
                model: model.to_string(),
            });
        };

        tracing::debug!(
            session_id,
            model,
            provider = tertiary.name(),
            "Routing unrecognized model to tertiary provider"
        );

        let system_prompt = self.assistant.system_prompt_for(prompt, language);
        match tertiary.complete(&system_prompt, prompt).await {
            Ok(text) => Ok(DispatchOutcome {
                text,
                provider: Some(ProviderRole::Tertiary),
                fell_back: false,
            }),
            Err(ProviderError::Timeout {
                provider,
                timeout_seconds,
            }) => Err(AppError::ProviderTimeout {
                provider,
                timeout_seconds,
            }),
            Err(e) => Err(AppError::ProviderQueryFailed {
                provider: tertiary.name().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn bind(&self, session_id: &str, role: ProviderRole) {
        self.bindings.insert(session_id.to_string(), role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const TEST_CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 0

[providers.primary]
name = "groq"
base_url = "http://127.0.0.1:1/v1"
model = "llama-3.3-70b"

[providers.secondary]
name = "openrouter"
base_url = "http://127.0.0.1:1/v1"
model = "mistral-small"

[providers.tertiary]
name = "deepinfra"
base_url = "http://127.0.0.1:1/v1"
model = "qwen-72b"
"#;

    fn test_dispatcher() -> ModelDispatcher {
        let config = Config::from_str(TEST_CONFIG).expect("test config should parse");
        ModelDispatcher::from_config(&config).expect("dispatcher should build")
    }

    #[test]
    fn test_provider_role_display() {
        assert_eq!(ProviderRole::Primary.to_string(), "primary");
        assert_eq!(ProviderRole::Secondary.to_string(), "secondary");
        assert_eq!(ProviderRole::Tertiary.to_string(), "tertiary");
    }

    #[test]
    fn test_new_session_has_no_binding() {
        let dispatcher = test_dispatcher();
        assert_eq!(dispatcher.binding("fresh"), None);
    }

    #[tokio::test]
    async fn test_creator_question_is_answered_without_providers() {
        // provider base URLs are unreachable; the canned path must not touch them
        let dispatcher = test_dispatcher();
        let outcome = dispatcher
            .dispatch("s1", "So, who created you?", "en", None)
            .await
            .expect("canned answer should succeed");

        assert_eq!(outcome.provider(), None);
        assert!(!outcome.fell_back());
        assert!(!outcome.text().is_empty());
        // canned answers never bind the session
        assert_eq!(dispatcher.binding("s1"), None);
    }

    #[tokio::test]
    async fn test_unknown_model_without_tertiary_is_rejected() {
        let config_without_tertiary = TEST_CONFIG
            .split("[providers.tertiary]")
            .next()
            .expect("fixture should split");
        let config = Config::from_str(config_without_tertiary).expect("test config should parse");
        let dispatcher = ModelDispatcher::from_config(&config).expect("dispatcher should build");

        let err = dispatcher
            .dispatch("s1", "What is the weather like in Paris today?", "en", Some("gpt-oss-120b"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UnknownModel { .. }));
    }

    #[tokio::test]
    async fn test_primary_model_name_does_not_route_to_tertiary() {
        // requesting the primary's own model follows the normal chain; with
        // unreachable providers that ends in exhaustion, not UnknownModel
        let dispatcher = test_dispatcher();
        let err = dispatcher
            .dispatch("s1", "Tell me about the weather in Paris today.", "en", Some("llama-3.3-70b"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ProvidersExhausted { .. }));
    }

    #[tokio::test]
    async fn test_both_providers_down_is_exhaustion_and_binds_secondary() {
        let dispatcher = test_dispatcher();
        let err = dispatcher
            .dispatch("s1", "Tell me about the weather in Paris today.", "en", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ProvidersExhausted { .. }));
        // the failed primary attempt still rebound the session
        assert_eq!(dispatcher.binding("s1"), Some(ProviderRole::Secondary));
    }
}
