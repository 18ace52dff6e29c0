//! Agent Core
//!
//! One conversation turn is a strict two-stage pipeline:
//!
//! 1. the [`Planner`] appends a plan for the latest user message;
//! 2. the [`Executor`] runs the plan and appends the answer.
//!
//! Nothing branches and nothing is retried at this level. Planner retries
//! live in the planner, provider failover and timeouts in the LLM router.

use crate::conductor::{ConversationState, Executor, Planner, Turn};
use crate::db::Preference;
use crate::llm::router::LLMRouter;
use crate::tools::ToolRegistry;
use sdk::errors::EngineError;
use sdk::MessageKind;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Build the state for one pipeline run from persisted history.
///
/// Keeps the last `max_turns` human and AI messages in chronological order;
/// system and tool messages never reach the planner.
pub fn build_state(
    history: &[(MessageKind, String)],
    user_id: i64,
    preferences: Vec<Preference>,
    max_turns: usize,
) -> ConversationState {
    let turns: Vec<Turn> = history
        .iter()
        .filter_map(|(kind, content)| match kind {
            MessageKind::Human => Some(Turn::user(content.as_str())),
            MessageKind::Ai => Some(Turn::assistant(content.as_str())),
            MessageKind::System | MessageKind::Tool => None,
        })
        .collect();

    let skip = turns.len().saturating_sub(max_turns);
    let mut state = ConversationState::new(user_id, preferences);
    for turn in turns.into_iter().skip(skip) {
        state.push(turn);
    }
    state
}

/// Planner followed by executor
pub struct Agent {
    planner: Planner,
    executor: Executor,
}

impl Agent {
    pub fn new(router: Arc<LLMRouter>, registry: Arc<ToolRegistry>, plan_retries: u32) -> Self {
        Self {
            planner: Planner::new(Arc::clone(&router), &registry, plan_retries),
            executor: Executor::new(router, registry),
        }
    }

    /// Log planner replies and tool fragments at debug level
    pub fn verbose(self, verbose: bool) -> Self {
        Self {
            planner: self.planner.verbose(verbose),
            executor: self.executor.verbose(verbose),
        }
    }

    /// Run the pipeline; the returned state ends with the assistant's answer
    pub async fn invoke(&self, state: ConversationState) -> Result<ConversationState, EngineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", %run_id, user_id = state.user_id);

        async {
            let start = Instant::now();
            let state = self.planner.invoke(state).await?;
            let state = self.executor.invoke(state).await?;
            info!(
                "Pipeline finished in {:.1}s",
                start.elapsed().as_secs_f64()
            );
            Ok(state)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::TurnRole;
    use crate::test_support::scripted_router;

    #[test]
    fn test_build_state_keeps_recent_dialogue() {
        let history = vec![
            (MessageKind::Human, "one".to_string()),
            (MessageKind::Ai, "two".to_string()),
            (MessageKind::System, "hidden".to_string()),
            (MessageKind::Human, "three".to_string()),
            (MessageKind::Ai, "four".to_string()),
            (MessageKind::Human, "five".to_string()),
        ];

        let state = build_state(&history, 9, vec![], 3);
        assert_eq!(state.user_id, 9);
        assert_eq!(state.transcript(), "user: three\nassistant: four\nuser: five");
        assert_eq!(state.turns[0].role, TurnRole::User);
    }

    #[test]
    fn test_build_state_shorter_than_window() {
        let history = vec![(MessageKind::Human, "hi".to_string())];
        assert_eq!(build_state(&history, 1, vec![], 5).turns.len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_plans_then_answers() {
        let (router, _) = scripted_router(&[
            "Nothing to look up.\n```json\n{\"tasks\": []}\n```",
            "Hi there!",
        ]);
        let agent = Agent::new(router, Arc::new(ToolRegistry::new()), 2);

        let state = build_state(&[(MessageKind::Human, "Hello".into())], 1, vec![], 5);
        let state = agent.invoke(state).await.unwrap();

        assert_eq!(state.turns.len(), 3);
        assert_eq!(state.turns[1].role, TurnRole::Planner);
        assert_eq!(state.answer(), Some("Hi there!"));
    }
}
