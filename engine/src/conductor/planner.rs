//! Conductor Planner
//!
//! Asks the LLM to reason about the conversation and emit an ordered list of
//! tool calls in a fenced ```json block. The block is parsed into a typed
//! [`Plan`]; a reply that does not parse is sent back to the model together
//! with the parse error, up to `agent.plan_retries` times.

use crate::conductor::types::{ConversationState, Plan, PlanParseError, PlanTask, Turn};
use crate::llm::router::LLMRouter;
use crate::llm::Message;
use crate::tools::{ToolKind, ToolRegistry};
use regex::Regex;
use sdk::errors::EngineError;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

const PLAN_SCHEMA: &str =
    r#"{"tasks": [{"tool": "<tool name>", "question": "<self-contained question for the tool>"}]}"#;

static JSON_BLOCK: OnceLock<Option<Regex>> = OnceLock::new();

fn json_block(content: &str) -> Option<&str> {
    JSON_BLOCK
        .get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").ok())
        .as_ref()?
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Intermediate deserialization type for LLM JSON output
#[derive(Debug, Deserialize)]
struct RawPlanTask {
    #[serde(alias = "agent")]
    tool: String,
    question: String,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    tasks: Vec<RawPlanTask>,
}

/// Parse a planner reply into a [`Plan`]
pub fn parse_plan(content: &str) -> Result<Plan, PlanParseError> {
    let block = json_block(content).ok_or(PlanParseError::MissingBlock)?;

    let raw: RawPlan =
        serde_json::from_str(block).map_err(|e| PlanParseError::InvalidJson(e.to_string()))?;

    let tasks = raw
        .tasks
        .into_iter()
        .map(|task| {
            let tool = task
                .tool
                .parse::<ToolKind>()
                .map_err(|e| PlanParseError::UnknownTool(e.0))?;
            Ok(PlanTask {
                tool,
                question: task.question,
            })
        })
        .collect::<Result<Vec<_>, PlanParseError>>()?;

    Ok(Plan { tasks })
}

pub struct Planner {
    router: Arc<LLMRouter>,
    /// Name and description of every tool the executor can run
    tools: Vec<(ToolKind, &'static str)>,
    retries: u32,
    verbose: bool,
}

impl Planner {
    pub fn new(router: Arc<LLMRouter>, registry: &ToolRegistry, retries: u32) -> Self {
        Self {
            router,
            tools: registry
                .tools()
                .iter()
                .map(|t| (t.kind(), t.description()))
                .collect(),
            retries,
            verbose: false,
        }
    }

    /// Log full planner replies at debug level
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn instructions(&self) -> String {
        let tools = self
            .tools
            .iter()
            .map(|(kind, description)| format!("- {}: {}", kind, description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You plan how to answer a user's request about movies, series and film people.\n\
You receive the dialogue HISTORY between the user and the assistant; later messages matter more.\n\n\
Available tools:\n{tools}\n\n\
How to plan:\n\
1. Reason step by step about what information the answer needs.\n\
2. Choose the tools that can provide it.\n\
3. Give each chosen tool one clear, self-contained question.\n\
4. Tools run one after another in plan order and each sees what the previous ones found, so order them accordingly.\n\
5. If the request needs no tools, return an empty task list.\n\n\
Write your reasoning, then finish with the plan in a ```json block in this format:\n{schema}",
            tools = tools,
            schema = PLAN_SCHEMA,
        )
    }

    /// Append a planner turn carrying the plan for this conversation
    pub async fn invoke(&self, mut state: ConversationState) -> Result<ConversationState, EngineError> {
        let start = Instant::now();
        let mut messages = vec![
            Message::system(self.instructions()),
            Message::user(format!("HISTORY:\n{}", state.transcript())),
        ];

        let mut attempt = 0;
        loop {
            let reply = self.router.complete(&messages).await?;
            if self.verbose {
                debug!("Planner reply:\n{}", reply);
            }

            match parse_plan(&reply) {
                Ok(plan) => {
                    info!(
                        "Planned {} tasks in {:.1}s",
                        plan.len(),
                        start.elapsed().as_secs_f64()
                    );
                    state.push(Turn::planner(reply, plan));
                    return Ok(state);
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!("Plan rejected ({}), retry {}/{}", e, attempt, self.retries);
                    messages.push(Message::assistant(reply));
                    messages.push(Message::user(format!(
                        "Your plan could not be used: {}.\n\
Reply again and finish with a ```json block in exactly this format, using only the listed tool names:\n{}",
                        e, PLAN_SCHEMA
                    )));
                }
                Err(e) => {
                    warn!("Plan rejected ({}), giving up after {} retries", e, attempt);
                    return Err(EngineError::PlanParse(e.to_string()));
                }
            }
        }
    }
}
