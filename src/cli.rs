//! Command-line interface for Chatrelay
//!
//! Provides argument parsing and subcommand handling for the Chatrelay binary.

use clap::{Parser, Subcommand};

/// Multilingual chat backend with LLM provider fallback
#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(version)]
#[command(about = "Multilingual chat backend with LLM provider fallback")]
#[command(
    long_about = "Chatrelay serves a multilingual chat API over hosted LLM providers: \
    prompts are language-detected and normalized, dispatched to a primary provider with \
    automatic fallback to a secondary on rate limits, and replies are translated back \
    and formatted as HTML."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Chatrelay Configuration
# =======================
#
# This file configures the HTTP server, SQLite storage, translation service,
# chat-completion providers, and assistant persona for Chatrelay.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 8000

# Request timeout in seconds (does not apply to /chat/stream)
request_timeout_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# STORAGE
# ─────────────────────────────────────────────────────────────────────────────

[database]
# SQLite database file; created on first start
path = "chatrelay.db"

# ─────────────────────────────────────────────────────────────────────────────
# TRANSLATION SERVICE
# ─────────────────────────────────────────────────────────────────────────────
#
# Language detection and translation. Any failure here degrades gracefully:
# detection falls back to "en" and translation returns the original text.

[translation]
base_url = "https://translation.googleapis.com"

# Name of the environment variable holding the API key. Leave unset for
# keyless endpoints (e.g. a local stub during development).
# api_key_env = "TRANSLATE_API_KEY"

# Timeout for detection/translation calls in seconds
timeout_seconds = 10

# ─────────────────────────────────────────────────────────────────────────────
# PROVIDERS
# ─────────────────────────────────────────────────────────────────────────────
#
# OpenAI-compatible chat-completion providers. The primary serves all traffic
# until it rate-limits or fails, then sessions fall back to the secondary and
# stick there. The optional tertiary only serves requests that name a model
# other than the primary's.
#
# Provider fields:
#   - name: Label used in logs and error messages
#   - base_url: API base URL (must start with http:// or https://)
#   - model: Model identifier sent in completion requests
#   - api_key_env: Environment variable holding the bearer token (optional)
#   - timeout_seconds: Per-request timeout (default 10)

[providers.primary]
name = "groq"
base_url = "https://api.groq.com/openai/v1"
model = "llama-3.3-70b-versatile"
api_key_env = "GROQ_API_KEY"
timeout_seconds = 10

[providers.secondary]
name = "openrouter"
base_url = "https://openrouter.ai/api/v1"
model = "mistralai/mistral-small-24b-instruct-2501"
api_key_env = "OPENROUTER_API_KEY"
timeout_seconds = 10

# Optional third provider for requests naming an unrecognized model:
# [providers.tertiary]
# name = "deepinfra"
# base_url = "https://api.deepinfra.com/v1/openai"
# model = "Qwen/Qwen2.5-72B-Instruct"
# api_key_env = "DEEPINFRA_API_KEY"
# timeout_seconds = 10

# ─────────────────────────────────────────────────────────────────────────────
# ASSISTANT PERSONA
# ─────────────────────────────────────────────────────────────────────────────
#
# Product content as configuration data. Every key has a default; uncomment
# to customize.

[assistant]
project_name = "Chatrelay"

# Base system prompt sent with every request
# system_prompt = "You are a helpful, knowledgeable assistant. Answer clearly and concisely."

# Appended to the system prompt when the prompt contains a greeting
# greeting_instruction = "Open your reply with a brief, friendly greeting."

# Appended when the requested language is not "en"; {language} is substituted
# language_instruction = "Reply in {language}."

# Canned answer for creator-identity questions (served without a provider call)
# creator_answer = "I was built by the Chatrelay team."

# Greeting substrings (case-insensitive) that skip language detection
# greetings = ["hi", "hello", "hey", "hola", "bonjour", "hallo", "ciao", "namaste"]

# Phrases that trigger the canned creator answer
# creator_questions = ["who created you", "who made you", "who built you", "who developed you", "who is your creator"]

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"
"#
}
