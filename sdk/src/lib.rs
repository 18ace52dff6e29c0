//! Reel SDK
//!
//! Shared error taxonomy and domain enumerations used by the engine crate
//! and its integration tests.

/// Error types and handling
pub mod errors;

/// Shared domain types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ReelErrorExt};
pub use types::{MessageKind, ParseKindError, PreferenceItem, PreferenceType};
