//! Conductor System
//!
//! Plans a conversation turn into tool calls and executes them.

pub mod executor;
pub mod planner;
pub mod types;

pub use executor::Executor;
pub use planner::{parse_plan, Planner};
pub use types::{CollectedInfo, ConversationState, Plan, PlanParseError, PlanTask, Turn, TurnRole};
