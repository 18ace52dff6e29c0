//! Pipeline tools
//!
//! Each tool turns one planner sub-question into one external call and a
//! natural-language fragment. Tools never return errors: a failed catalog
//! call becomes [`CATALOG_ERROR_TEXT`], a failed LLM step becomes
//! [`TOOL_FAILURE_TEXT`], and the executor carries on with the next task.
//!
//! Most tools run the same two stages:
//!
//! 1. ask the LLM for a JSON query object, keep only the keys the tool
//!    allows ([`allowed_params`]);
//! 2. call the external service and ask the LLM to phrase the raw result as
//!    an answer to the sub-question ([`phrase_answer`]).

pub mod movie_by_title;
pub mod movie_search;
pub mod person_by_name;
pub mod person_search;
pub mod preferences;
pub mod reviews;
pub mod semantic_search;

pub use movie_by_title::MovieSearchByNameTool;
pub use movie_search::MoviesSearchTool;
pub use person_by_name::PeopleSearchByNameTool;
pub use person_search::PeopleSearchTool;
pub use preferences::UserPreferencesTool;
pub use reviews::ReviewsSummarizerTool;
pub use semantic_search::SemanticSearchTool;

pub use crate::catalog::CATALOG_ERROR_TEXT;

use crate::catalog::{CatalogClient, CatalogQuery};
use crate::db::PreferenceRepository;
use crate::encyclopedia::EncyclopediaClient;
use crate::index::VectorIndex;
use crate::llm::router::LLMRouter;
use crate::llm::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fragment returned when a tool's LLM step fails
pub const TOOL_FAILURE_TEXT: &str = "This part of the request could not be processed.";

/// The closed set of tools a plan may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    MoviesSearch,
    MovieSearchByName,
    PeopleSearch,
    PeopleSearchByName,
    MovieReviewsSummarizer,
    MovieSemanticSearch,
    UserPreferencesManager,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::MoviesSearch,
        ToolKind::MovieSearchByName,
        ToolKind::PeopleSearch,
        ToolKind::PeopleSearchByName,
        ToolKind::MovieReviewsSummarizer,
        ToolKind::MovieSemanticSearch,
        ToolKind::UserPreferencesManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::MoviesSearch => "MoviesSearch",
            ToolKind::MovieSearchByName => "MovieSearchByName",
            ToolKind::PeopleSearch => "PeopleSearch",
            ToolKind::PeopleSearchByName => "PeopleSearchByName",
            ToolKind::MovieReviewsSummarizer => "MovieReviewsSummarizer",
            ToolKind::MovieSemanticSearch => "MovieSemanticSearch",
            ToolKind::UserPreferencesManager => "UserPreferencesManager",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool '{0}'")]
pub struct UnknownTool(pub String);

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ToolKind::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| UnknownTool(name.to_string()))
    }
}

#[async_trait]
pub trait MovieTool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// What the tool answers and what its output contains, for the planner
    fn description(&self) -> &'static str;

    /// Answer `question` given the fragments collected so far
    async fn invoke(&self, question: &str, context: &str, user_id: i64) -> String;
}

/// Tools available to the executor, keyed by kind
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn MovieTool>>,
}

/// Shared clients the standard tool set is built from
pub struct ToolDeps {
    pub router: Arc<LLMRouter>,
    pub catalog: Arc<CatalogClient>,
    pub preferences: PreferenceRepository,
    /// `None` makes person-by-name lookups use the catalog instead
    pub encyclopedia: Option<Arc<EncyclopediaClient>>,
    /// `None` leaves semantic search unregistered
    pub index: Option<Arc<dyn VectorIndex>>,
    pub review_limit: usize,
    pub distance_threshold: f64,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All tools whose backing services are configured
    pub fn standard(deps: ToolDeps) -> Self {
        let mut registry = Self::new();
        registry.register(MoviesSearchTool::new(
            Arc::clone(&deps.router),
            Arc::clone(&deps.catalog),
        ));
        registry.register(MovieSearchByNameTool::new(
            Arc::clone(&deps.router),
            Arc::clone(&deps.catalog),
        ));
        registry.register(PeopleSearchTool::new(
            Arc::clone(&deps.router),
            Arc::clone(&deps.catalog),
        ));
        registry.register(PeopleSearchByNameTool::new(
            Arc::clone(&deps.router),
            Arc::clone(&deps.catalog),
            deps.encyclopedia.clone(),
        ));
        registry.register(ReviewsSummarizerTool::new(
            Arc::clone(&deps.router),
            Arc::clone(&deps.catalog),
            deps.review_limit,
        ));
        if let Some(index) = deps.index {
            registry.register(SemanticSearchTool::new(index, deps.distance_threshold));
        }
        registry.register(UserPreferencesTool::new(
            deps.router,
            deps.catalog,
            deps.preferences,
        ));
        registry
    }

    /// Add or replace the tool for its kind
    pub fn register(&mut self, tool: impl MovieTool + 'static) {
        self.tools.insert(tool.kind(), Arc::new(tool));
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn MovieTool>> {
        self.tools.get(&kind).cloned()
    }

    /// Registered tools in declaration order
    pub fn tools(&self) -> Vec<Arc<dyn MovieTool>> {
        ToolKind::ALL
            .into_iter()
            .filter_map(|k| self.get(k))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Keep only allow-listed keys of a stage-A query object
pub(crate) fn allowed_params(
    kind: ToolKind,
    raw: Map<String, Value>,
    allowed: &[&str],
) -> Map<String, Value> {
    raw.into_iter()
        .filter(|(key, _)| {
            let keep = allowed.contains(&key.as_str());
            if !keep {
                warn!("{}: dropping unsupported query parameter '{}'", kind, key);
            }
            keep
        })
        .collect()
}

/// Scalar JSON values as query strings; arrays flatten, objects and nulls vanish
pub(crate) fn value_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Array(items) => items.iter().flat_map(value_strings).collect(),
        _ => Vec::new(),
    }
}

/// Copy filtered params into a catalog query, each key replacing its defaults
pub(crate) fn apply_params(mut query: CatalogQuery, params: &Map<String, Value>) -> CatalogQuery {
    for (key, value) in params {
        let values = value_strings(value);
        if !values.is_empty() {
            query = query.with_all(key, values);
        }
    }
    query
}

/// Strip the quoting and markup planners tend to wrap bare names in
pub(crate) fn bare_subject(question: &str) -> &str {
    question.trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '«' | '»') || c.is_whitespace())
}

/// Stage A: ask for a JSON object describing the external query
pub(crate) async fn request_query(
    router: &LLMRouter,
    kind: ToolKind,
    instructions: &str,
    question: &str,
    context: &str,
) -> Option<Map<String, Value>> {
    let messages = [
        Message::system(instructions),
        Message::user(format!(
            "QUESTION:\n{}\n\nCOLLECTED_INFO:\n{}\n\nReply with the JSON object only.",
            question, context
        )),
    ];

    match router.complete_json::<Map<String, Value>>(&messages).await {
        Ok(object) => {
            let query = serde_json::Value::Object(object.clone());
            debug!("{} query: {}", kind, query);
            Some(object)
        }
        Err(e) => {
            warn!("{} could not build a query: {}", kind, e);
            None
        }
    }
}

const ANSWER_INSTRUCTIONS: &str = "You answer a user's question about movies, series and people of the film industry.\n\
Use only the data in INFO. Partly repeat the question in your answer so it is clear what was found.\n\
If INFO does not contain the answer, say that the information was not found.\n\
Answer in the language of the question.";

/// Stage B: phrase raw data as an answer to `question`
pub(crate) async fn phrase_answer(
    router: &LLMRouter,
    kind: ToolKind,
    field_notes: &str,
    question: &str,
    info: &str,
) -> String {
    let messages = [
        Message::system(format!("{}\n\nFields in INFO:\n{}", ANSWER_INSTRUCTIONS, field_notes)),
        Message::user(format!(
            "QUESTION:\n{}\n\nINFO:\n```text\n{}\n```",
            question, info
        )),
    ];

    match router.complete(&messages).await {
        Ok(answer) => answer.trim().to_string(),
        Err(e) => {
            warn!("{} could not phrase its answer: {}", kind, e);
            TOOL_FAILURE_TEXT.to_string()
        }
    }
}
