//! Chatrelay - multilingual chat backend with LLM provider fallback
//!
//! This library serves a chat API over hosted OpenAI-compatible LLM
//! providers: prompts are language-detected and normalized to English,
//! dispatched to a primary provider with sticky per-session fallback to a
//! secondary on rate limits, and replies are translated back to the
//! requested language and formatted as HTML.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod handlers;
pub mod language;
pub mod middleware;
pub mod providers;
pub mod storage;
pub mod telemetry;
