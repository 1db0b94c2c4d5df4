//! Configuration management for Chatrelay
//!
//! Parses TOML configuration files and provides typed access to settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "chatrelay.db".to_string()
}

/// Translation service configuration
///
/// Points at a Google-Translate-v2-shaped API. `base_url` is configurable so
/// tests can target a local stub server. The API key is named indirectly via
/// `api_key_env` and resolved from the environment at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_outbound_timeout")]
    pub timeout_seconds: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_translation_base_url(),
            api_key_env: None,
            timeout_seconds: default_outbound_timeout(),
        }
    }
}

fn default_translation_base_url() -> String {
    "https://translation.googleapis.com".to_string()
}

fn default_outbound_timeout() -> u64 {
    10
}

/// LLM provider chain configuration
///
/// Primary and secondary are required; the tertiary provider is optional and
/// only consulted when a request names a model the primary chain does not
/// serve.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    pub primary: ProviderConfig,
    pub secondary: ProviderConfig,
    #[serde(default)]
    pub tertiary: Option<ProviderConfig>,
}

/// Individual provider endpoint configuration
///
/// All fields are private to enforce invariants. Configuration is loaded via
/// deserialization and validated via Config::validate(). After construction,
/// fields cannot be mutated, ensuring validated data remains valid.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    name: String,
    base_url: String,
    model: String,
    api_key_env: Option<String>,
    timeout_seconds: u64,
}

impl ProviderConfig {
    /// Create a new ProviderConfig with a validated timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is zero or exceeds 300 seconds.
    pub fn new(
        name: String,
        base_url: String,
        model: String,
        api_key_env: Option<String>,
        timeout_seconds: u64,
    ) -> crate::error::AppResult<Self> {
        if timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(format!(
                "provider '{}' timeout_seconds must be greater than 0",
                name
            )));
        }
        if timeout_seconds > 300 {
            return Err(crate::error::AppError::Config(format!(
                "provider '{}' timeout_seconds cannot exceed 300 seconds (5 minutes), got {}",
                name, timeout_seconds
            )));
        }
        Ok(Self {
            name,
            base_url,
            model,
            api_key_env,
            timeout_seconds,
        })
    }

    /// Get the provider name (used in logs and error messages)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the provider base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model identifier sent in completion requests
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the environment variable name holding the API key, if any
    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env.as_deref()
    }

    /// Get the per-request timeout in seconds
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

/// Custom Deserialize implementation for ProviderConfig
///
/// Enforces timeout validation at deserialization time by routing through the
/// validated `new()` constructor, so an out-of-range timeout is rejected while
/// the TOML is being parsed rather than later.
impl<'de> Deserialize<'de> for ProviderConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, MapAccess, Visitor};
        use std::fmt;

        #[derive(Deserialize)]
        #[serde(field_identifier, rename_all = "snake_case")]
        enum Field {
            Name,
            BaseUrl,
            Model,
            ApiKeyEnv,
            TimeoutSeconds,
        }

        struct ProviderConfigVisitor;

        impl<'de> Visitor<'de> for ProviderConfigVisitor {
            type Value = ProviderConfig;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a provider table with name, base_url, model, \
                     optional api_key_env, and optional timeout_seconds",
                )
            }

            fn visit_map<V>(self, mut map: V) -> Result<ProviderConfig, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut name = None;
                let mut base_url = None;
                let mut model = None;
                let mut api_key_env = None;
                let mut timeout_seconds = None;

                while let Some(key) = map.next_key()? {
                    match key {
                        Field::Name => {
                            if name.is_some() {
                                return Err(de::Error::duplicate_field("name"));
                            }
                            name = Some(map.next_value()?);
                        }
                        Field::BaseUrl => {
                            if base_url.is_some() {
                                return Err(de::Error::duplicate_field("base_url"));
                            }
                            base_url = Some(map.next_value()?);
                        }
                        Field::Model => {
                            if model.is_some() {
                                return Err(de::Error::duplicate_field("model"));
                            }
                            model = Some(map.next_value()?);
                        }
                        Field::ApiKeyEnv => {
                            if api_key_env.is_some() {
                                return Err(de::Error::duplicate_field("api_key_env"));
                            }
                            api_key_env = Some(map.next_value()?);
                        }
                        Field::TimeoutSeconds => {
                            if timeout_seconds.is_some() {
                                return Err(de::Error::duplicate_field("timeout_seconds"));
                            }
                            timeout_seconds = Some(map.next_value()?);
                        }
                    }
                }

                let name: String = name.ok_or_else(|| de::Error::missing_field("name"))?;
                let base_url: String =
                    base_url.ok_or_else(|| de::Error::missing_field("base_url"))?;
                let model: String = model.ok_or_else(|| de::Error::missing_field("model"))?;
                let timeout_seconds = timeout_seconds.unwrap_or_else(default_outbound_timeout);

                ProviderConfig::new(name, base_url, model, api_key_env, timeout_seconds)
                    .map_err(|e| de::Error::custom(format!("invalid provider configuration: {}", e)))
            }
        }

        deserializer.deserialize_struct(
            "ProviderConfig",
            &["name", "base_url", "model", "api_key_env", "timeout_seconds"],
            ProviderConfigVisitor,
        )
    }
}

/// Assistant persona and canned-content configuration
///
/// Product content lives here as data, not code: the project name, the system
/// prompt, the greeting shortcut list, and the canned creator-identity answer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_greeting_instruction")]
    pub greeting_instruction: String,
    /// Appended to the system prompt when the requested language is not "en".
    /// Must contain a `{language}` placeholder.
    #[serde(default = "default_language_instruction")]
    pub language_instruction: String,
    #[serde(default = "default_creator_answer")]
    pub creator_answer: String,
    #[serde(default = "default_greetings")]
    pub greetings: Vec<String>,
    #[serde(default = "default_creator_questions")]
    pub creator_questions: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            system_prompt: default_system_prompt(),
            greeting_instruction: default_greeting_instruction(),
            language_instruction: default_language_instruction(),
            creator_answer: default_creator_answer(),
            greetings: default_greetings(),
            creator_questions: default_creator_questions(),
        }
    }
}

impl AssistantConfig {
    /// Check whether a prompt contains one of the configured greeting phrases
    ///
    /// Case-insensitive substring match, mirroring the language detector's
    /// greeting shortcut.
    pub fn is_greeting(&self, prompt: &str) -> bool {
        let lowered = prompt.to_lowercase();
        self.greetings.iter().any(|g| lowered.contains(g.as_str()))
    }

    /// Check whether a prompt asks about the assistant's creator
    pub fn is_creator_question(&self, prompt: &str) -> bool {
        let lowered = prompt.to_lowercase();
        self.creator_questions
            .iter()
            .any(|q| lowered.contains(q.as_str()))
    }

    /// Build the system prompt for a request
    ///
    /// Starts from the configured base persona, appends the greeting
    /// instruction when the prompt matches the greeting list, and appends the
    /// language instruction when the requested language is not "en".
    pub fn system_prompt_for(&self, prompt: &str, language: &str) -> String {
        let mut parts = vec![self.system_prompt.clone()];
        if self.is_greeting(prompt) {
            parts.push(self.greeting_instruction.clone());
        }
        if language != "en" {
            parts.push(self.language_instruction.replace("{language}", language));
        }
        parts.join(" ")
    }

    /// The welcome message served at the root endpoint
    pub fn welcome_message(&self) -> String {
        format!("Welcome to {}", self.project_name)
    }
}

fn default_project_name() -> String {
    "Chatrelay".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful, knowledgeable assistant. Answer clearly and concisely.".to_string()
}

fn default_greeting_instruction() -> String {
    "Open your reply with a brief, friendly greeting.".to_string()
}

fn default_language_instruction() -> String {
    "Reply in {language}.".to_string()
}

fn default_creator_answer() -> String {
    "I was built by the Chatrelay team.".to_string()
}

fn default_greetings() -> Vec<String> {
    ["hi", "hello", "hey", "hola", "bonjour", "hallo", "ciao", "namaste"]
        .map(String::from)
        .to_vec()
}

fn default_creator_questions() -> Vec<String> {
    [
        "who created you",
        "who made you",
        "who built you",
        "who developed you",
        "who is your creator",
    ]
    .map(String::from)
    .to_vec()
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            crate::error::AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| crate::error::AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// All configured providers with their chain role names
    fn provider_entries(&self) -> Vec<(&'static str, &ProviderConfig)> {
        let mut entries = vec![
            ("primary", &self.providers.primary),
            ("secondary", &self.providers.secondary),
        ];
        if let Some(tertiary) = &self.providers.tertiary {
            entries.push(("tertiary", tertiary));
        }
        entries
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> crate::error::AppResult<()> {
        for (role, provider) in self.provider_entries() {
            if provider.name.trim().is_empty() {
                return Err(crate::error::AppError::Config(format!(
                    "providers.{} has an empty name",
                    role
                )));
            }

            if provider.model.trim().is_empty() {
                return Err(crate::error::AppError::Config(format!(
                    "providers.{} ('{}') has an empty model",
                    role, provider.name
                )));
            }

            if !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                return Err(crate::error::AppError::Config(format!(
                    "providers.{} ('{}') has invalid base_url '{}'. \
                    base_url must start with 'http://' or 'https://'.",
                    role, provider.name, provider.base_url
                )));
            }
        }

        if !self.translation.base_url.starts_with("http://")
            && !self.translation.base_url.starts_with("https://")
        {
            return Err(crate::error::AppError::Config(format!(
                "translation.base_url '{}' must start with 'http://' or 'https://'",
                self.translation.base_url
            )));
        }

        if self.translation.timeout_seconds == 0 || self.translation.timeout_seconds > 300 {
            return Err(crate::error::AppError::Config(format!(
                "translation.timeout_seconds must be between 1 and 300, got {}",
                self.translation.timeout_seconds
            )));
        }

        if self.database.path.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "database.path must not be empty".to_string(),
            ));
        }

        if !self.assistant.language_instruction.contains("{language}") {
            return Err(crate::error::AppError::Config(format!(
                "assistant.language_instruction must contain a '{{language}}' placeholder, got '{}'",
                self.assistant.language_instruction
            )));
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "server.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.server.request_timeout_seconds > 300 {
            return Err(crate::error::AppError::Config(format!(
                "server.request_timeout_seconds cannot exceed 300 seconds (5 minutes), got {}",
                self.server.request_timeout_seconds
            )));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = crate::error::AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            }
        })?;

        config.validate()?;
        Ok(config)
    }
}
