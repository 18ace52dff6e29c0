//! Reel Engine Library
//!
//! Conversational movie assistant: a planner splits each user message into
//! tool calls against a movie catalog, an encyclopedia and a vector index,
//! and an executor turns the collected answers into one reply. Used by the
//! `reel` binary and the integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// Movie catalog HTTP client
pub mod catalog;

/// Encyclopedia lookups for people
pub mod encyclopedia;

/// Vector index for description search
pub mod index;

/// Movie tools invoked by the executor
pub mod tools;

/// Planner and executor
pub mod conductor;

/// Pipeline entry point
pub mod agent;

/// Scheduled personal recommendations
pub mod recommend;

/// Telegram bot module
pub mod bot;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

#[cfg(test)]
mod test_support;
