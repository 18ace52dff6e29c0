//! Agent
//!
//! Entry point of the question-answering pipeline: build a conversation
//! state from stored history, then run planner and executor over it.

pub mod core;

pub use core::{build_state, Agent};
