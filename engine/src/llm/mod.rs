//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the chat-completion backends
//! (OpenAI-compatible APIs and Ollama). The [`LLMProvider`] trait defines the
//! contract every backend implements; [`router::LLMRouter`] fronts a set of
//! providers with ordering, timeouts and failover, and is the handle the rest
//! of the engine holds.
//!
//! The pipeline needs two kinds of output from a model: free text (answers,
//! summaries, planner reasoning) and structured JSON (query objects). The
//! JSON helpers at the bottom of this module recover a JSON value from the
//! ways models actually return it: bare, fenced, or embedded in prose.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod ollama;
pub mod openai;
pub mod router;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for sdk::errors::EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Timeout => sdk::errors::EngineError::LLMTimeout,
            other => sdk::errors::EngineError::LLMProvider(other.to_string()),
        }
    }
}

/// Message in a conversation sent to a provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Output shape requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A single JSON object (provider JSON mode where supported)
    Json,
}

/// Completion returned by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text
    pub content: String,

    /// Model that produced it, as reported by the backend
    pub model: String,
}

impl LLMResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider ("openai", "ollama")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama), false for cloud providers
    fn is_local(&self) -> bool;

    /// Returns the estimated cost of `tokens` tokens in USD.
    /// Local providers should return 0.0
    fn estimated_cost(&self, tokens: usize) -> f64;

    /// Generate a completion for `messages`
    async fn generate(&self, messages: &[Message], format: ResponseFormat) -> Result<LLMResponse>;

    /// Check if the provider is currently healthy and available
    async fn check_health(&self) -> bool {
        true
    }
}

/// Deserialize a `T` from model output.
///
/// Tries, in order: the whole trimmed text, the body of the first fenced
/// code block, and the first balanced `{...}` object found in the text.
pub fn parse_json_payload<T: DeserializeOwned>(content: &str) -> Result<T> {
    let trimmed = content.trim();

    let mut last_error = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    if let Some(inner) = extract_fenced_json(trimmed) {
        match serde_json::from_str::<T>(inner.trim()) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    if let Some(pos) = trimmed.find('{') {
        if let Some(candidate) = extract_balanced_json(&trimmed[pos..]) {
            match serde_json::from_str::<T>(candidate) {
                Ok(value) => return Ok(value),
                Err(e) => last_error = e.to_string(),
            }
        }
    }

    Err(LLMError::ParseError(format!(
        "no JSON object matching the expected shape: {}",
        last_error
    )))
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
pub fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
pub fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
