//! Conductor Executor
//!
//! Runs the tasks of the latest plan in order, feeding every tool the
//! fragments gathered before it, then asks the LLM for the final answer.

use crate::conductor::types::{CollectedInfo, ConversationState, Turn};
use crate::llm::router::LLMRouter;
use crate::llm::Message;
use crate::tools::ToolRegistry;
use sdk::errors::EngineError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const ANSWER_INSTRUCTIONS: &str = "You help the user with questions about movies, series, actors and other film people.\n\
You receive the dialogue HISTORY between the user and the assistant (later user messages matter more) \
and COLLECTED_INFO gathered from movie databases for the latest request.\n\
Answer the user's latest message using COLLECTED_INFO. Give a thorough answer. Do not invent anything: \
if the information is missing or an error was reported, say so politely.\n\
Answer in the language of the user's latest message.";

pub struct Executor {
    router: Arc<LLMRouter>,
    registry: Arc<ToolRegistry>,
    verbose: bool,
}

impl Executor {
    pub fn new(router: Arc<LLMRouter>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            router,
            registry,
            verbose: false,
        }
    }

    /// Log every fragment at debug level
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the latest plan and append the assistant's answer
    pub async fn invoke(&self, mut state: ConversationState) -> Result<ConversationState, EngineError> {
        let plan = state.latest_plan().cloned().ok_or(EngineError::MissingPlan)?;
        let mut collected = CollectedInfo::seeded(&state.preferences);

        for (i, task) in plan.tasks.iter().enumerate() {
            let tool = self
                .registry
                .get(task.tool)
                .ok_or_else(|| EngineError::ToolNotFound(task.tool.to_string()))?;

            let start = Instant::now();
            info!("Task {}/{}: {}", i + 1, plan.len(), task.tool);

            let fragment = tool
                .invoke(&task.question, &collected.joined(), state.user_id)
                .await;

            info!(
                "Task {}/{} finished in {:.1}s ({} chars)",
                i + 1,
                plan.len(),
                start.elapsed().as_secs_f64(),
                fragment.len()
            );
            if self.verbose {
                debug!("{} fragment:\n{}", task.tool, fragment);
            }
            collected.push(fragment);
        }

        let messages = [
            Message::system(ANSWER_INSTRUCTIONS),
            Message::user(format!(
                "HISTORY:\n{}\n\nCOLLECTED_INFO:\n{}",
                state.transcript(),
                collected.joined()
            )),
        ];
        let answer = self.router.complete(&messages).await?;

        state.push(Turn::assistant(answer.trim()));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::types::{Plan, PlanTask};
    use crate::test_support::scripted_router;
    use crate::tools::{MovieTool, ToolKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the context it was given and echoes a fixed fragment
    struct EchoTool {
        kind: ToolKind,
        reply: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MovieTool for EchoTool {
        fn kind(&self) -> ToolKind {
            self.kind
        }

        fn description(&self) -> &'static str {
            "test tool"
        }

        async fn invoke(&self, _question: &str, context: &str, _user_id: i64) -> String {
            self.seen.lock().unwrap().push(context.to_string());
            self.reply.to_string()
        }
    }

    fn state_with(plan: Plan) -> ConversationState {
        let mut state = ConversationState::new(7, vec![]);
        state.push(Turn::user("question"));
        state.push(Turn::planner("", plan));
        state
    }

    fn task(tool: ToolKind) -> PlanTask {
        PlanTask {
            tool,
            question: "q".into(),
        }
    }

    #[tokio::test]
    async fn test_fragments_thread_through_tasks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool {
            kind: ToolKind::PeopleSearchByName,
            reply: "first",
            seen: Arc::clone(&seen),
        });
        registry.register(EchoTool {
            kind: ToolKind::PeopleSearch,
            reply: "second",
            seen: Arc::clone(&seen),
        });

        let (router, prompts) = scripted_router(&["final answer"]);
        let executor = Executor::new(router, Arc::new(registry));

        let plan = Plan {
            tasks: vec![task(ToolKind::PeopleSearchByName), task(ToolKind::PeopleSearch)],
        };
        let state = executor.invoke(state_with(plan)).await.unwrap();

        assert_eq!(state.answer(), Some("final answer"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "No known user preferences.".to_string(),
                "No known user preferences.\n\nfirst".to_string()
            ]
        );
        let synthesis = &prompts.lock().unwrap()[0][1].content;
        assert!(synthesis.contains("first\n\nsecond"));
        assert!(synthesis.contains("user: question"));
    }

    #[tokio::test]
    async fn test_empty_plan_still_answers() {
        let (router, prompts) = scripted_router(&["Hello!"]);
        let executor = Executor::new(router, Arc::new(ToolRegistry::new()));

        let state = executor.invoke(state_with(Plan::default())).await.unwrap();

        assert_eq!(state.answer(), Some("Hello!"));
        assert!(prompts.lock().unwrap()[0][1]
            .content
            .contains("No known user preferences."));
    }

    #[tokio::test]
    async fn test_unregistered_tool_is_named() {
        let (router, _) = scripted_router(&[]);
        let executor = Executor::new(router, Arc::new(ToolRegistry::new()));

        let plan = Plan {
            tasks: vec![task(ToolKind::MovieSemanticSearch)],
        };
        let err = executor.invoke(state_with(plan)).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool not found: MovieSemanticSearch");
    }

    #[tokio::test]
    async fn test_missing_plan() {
        let (router, _) = scripted_router(&[]);
        let executor = Executor::new(router, Arc::new(ToolRegistry::new()));

        let mut state = ConversationState::new(1, vec![]);
        state.push(Turn::user("hi"));
        assert!(matches!(
            executor.invoke(state).await,
            Err(EngineError::MissingPlan)
        ));
    }
}
