//! Conductor Types
//!
//! Conversation state threaded through one pipeline run, and the plan the
//! planner hands to the executor.

use crate::db::Preference;
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    /// Planner output; carries the plan and is hidden from transcripts
    Planner,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
            TurnRole::Planner => write!(f, "planner"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            plan: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            plan: None,
        }
    }

    /// The planner's raw reply together with the plan parsed from it
    pub fn planner(content: impl Into<String>, plan: Plan) -> Self {
        Self {
            role: TurnRole::Planner,
            content: content.into(),
            plan: Some(plan),
        }
    }
}

/// One sub-task: which tool to run and what to ask it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTask {
    #[serde(alias = "agent")]
    pub tool: ToolKind,
    pub question: String,
}

/// Ordered sub-tasks; the executor runs them exactly in this order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub tasks: Vec<PlanTask>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Why a planner reply could not become a [`Plan`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanParseError {
    #[error("reply contains no ```json block")]
    MissingBlock,

    #[error("plan JSON is invalid: {0}")]
    InvalidJson(String),

    #[error("plan names unknown tool '{0}'")]
    UnknownTool(String),
}

/// Everything one pipeline run knows about the conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub user_id: i64,
    pub turns: Vec<Turn>,
    pub preferences: Vec<Preference>,
}

impl ConversationState {
    pub fn new(user_id: i64, preferences: Vec<Preference>) -> Self {
        Self {
            user_id,
            turns: Vec::new(),
            preferences,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Plan of the most recent planner turn
    pub fn latest_plan(&self) -> Option<&Plan> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::Planner)
            .and_then(|t| t.plan.as_ref())
    }

    /// Text of the final assistant turn, if the run produced one
    pub fn answer(&self) -> Option<&str> {
        self.turns
            .last()
            .filter(|t| t.role == TurnRole::Assistant)
            .map(|t| t.content.as_str())
    }

    /// Role-prefixed transcript of user and assistant turns
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .filter(|t| t.role != TurnRole::Planner)
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fragments gathered during one run, starting with the preference summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedInfo {
    fragments: Vec<String>,
}

impl CollectedInfo {
    /// Seed with one sentence per stored preference
    pub fn seeded(preferences: &[Preference]) -> Self {
        let seed = if preferences.is_empty() {
            "No known user preferences.".to_string()
        } else {
            preferences
                .iter()
                .map(Preference::sentence)
                .collect::<Vec<_>>()
                .join(" ")
        };
        Self {
            fragments: vec![seed],
        }
    }

    pub fn push(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// All fragments joined for prompts; empty fragments are skipped
    pub fn joined(&self) -> String {
        self.fragments
            .iter()
            .filter(|f| !f.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
