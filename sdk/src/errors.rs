//! Error types and handling
//!
//! This module provides the error types used throughout the Reel engine.
//! All errors implement the `ReelErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Hints returned by `user_hint()` are static strings. They never echo the
//! wrapped detail, so API keys or chat content carried in a variant payload
//! cannot leak to chat users through a hint.

use thiserror::Error;

/// Trait for Reel error extensions
///
/// Provides additional context for errors: a hint that is safe to show to an
/// end user, and whether retrying the operation can reasonably succeed.
pub trait ReelErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors require a configuration change or other manual intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Database**: SQLite operation failures
/// - **LLM Provider**: API failures, authentication errors, timeouts
/// - **Pipeline**: plan parsing, tool lookup, missing plan
/// - **External services**: catalog API, encyclopedia, vector index
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ReelErrorExt};
///
/// let error = EngineError::ToolNotFound("MovieSemanticSearch".to_string());
/// assert_eq!(error.to_string(), "Tool not found: MovieSemanticSearch");
/// assert!(!error.is_recoverable());
///
/// let transient = EngineError::CatalogApi("HTTP 502".to_string());
/// assert!(transient.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("All LLM providers exhausted")]
    AllProvidersExhausted,

    #[error("LLM call timed out")]
    LLMTimeout,

    // Pipeline errors
    #[error("Plan parse error: {0}")]
    PlanParse(String),

    #[error("No plan found in conversation state")]
    MissingPlan,

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    // External services
    #[error("Catalog API error: {0}")]
    CatalogApi(String),

    #[error("Encyclopedia error: {0}")]
    Encyclopedia(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReelErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::Database(_) => "Database operation failed. Try again in a moment",

            Self::LLMProvider(_) => "LLM provider unavailable. Check your API keys and network",
            Self::AllProvidersExhausted => "No LLM providers available. Check configuration",
            Self::LLMTimeout => "LLM provider took too long to respond. Try again",

            Self::PlanParse(_) => "Could not understand the request. Try rephrasing it",
            Self::MissingPlan => "Internal pipeline error. Try again",
            Self::ToolNotFound(_) => "The requested capability is not available",

            Self::CatalogApi(_) => "The movie database is unavailable. Try again later",
            Self::Encyclopedia(_) => "The encyclopedia is unavailable. Try again later",
            Self::VectorIndex(_) => "Semantic search is unavailable. Check the index server",

            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",
            Self::SecretNotFound(_) => "A required API key is missing. Run 'reel setup'",

            Self::Network(_) => "Network operation failed. Check your connection",

            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::AllProvidersExhausted
            | Self::ToolNotFound(_)
            | Self::MissingPlan
            | Self::SecretNotFound(_) => false,

            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_do_not_echo_payload() {
        let err = EngineError::LLMProvider("sk-secret-value".to_string());
        assert!(!err.user_hint().contains("sk-secret-value"));
        assert!(err.to_string().contains("sk-secret-value"));
    }

    #[test]
    fn test_recoverability() {
        assert!(!EngineError::Config("bad".into()).is_recoverable());
        assert!(!EngineError::ToolNotFound("X".into()).is_recoverable());
        assert!(EngineError::LLMTimeout.is_recoverable());
        assert!(EngineError::PlanParse("no block".into()).is_recoverable());
        assert!(EngineError::Network("reset".into()).is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
