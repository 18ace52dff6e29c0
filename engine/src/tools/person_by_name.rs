//! Person lookup by name
//!
//! Prefers the encyclopedia's page intro, which reads better than raw
//! catalog records. When the encyclopedia is disabled the catalog's person
//! search answers instead.

use super::{
    allowed_params, bare_subject, phrase_answer, request_query, value_strings, MovieTool,
    ToolKind, CATALOG_ERROR_TEXT,
};
use crate::catalog::CatalogClient;
use crate::encyclopedia::{EncyclopediaClient, PERSON_NOT_FOUND_TEXT};
use crate::llm::router::LLMRouter;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

const INSTRUCTIONS: &str = "You extract the names of film people from a question.\n\
Return a JSON object {\"query\": [\"<full name>\", ...]} with every person the question asks about.";

const FIELD_NOTES: &str = "Short biographies or person records, one per name.";

pub struct PeopleSearchByNameTool {
    router: Arc<LLMRouter>,
    catalog: Arc<CatalogClient>,
    encyclopedia: Option<Arc<EncyclopediaClient>>,
}

impl PeopleSearchByNameTool {
    pub fn new(
        router: Arc<LLMRouter>,
        catalog: Arc<CatalogClient>,
        encyclopedia: Option<Arc<EncyclopediaClient>>,
    ) -> Self {
        Self {
            router,
            catalog,
            encyclopedia,
        }
    }

    async fn describe(&self, name: &str) -> String {
        if let Some(encyclopedia) = &self.encyclopedia {
            return match encyclopedia.person_summary(name).await {
                Ok(Some(summary)) => format!("{}:\n{}", name, summary),
                Ok(None) => format!("{}:\n{}", name, PERSON_NOT_FOUND_TEXT),
                Err(e) => {
                    warn!("Encyclopedia lookup for '{}' failed: {}", name, e);
                    format!("{}:\n{}", name, PERSON_NOT_FOUND_TEXT)
                }
            };
        }

        match self.catalog.search_people_by_name(name, 1).await {
            Ok(people) if people.is_empty() => format!("{}:\n{}", name, PERSON_NOT_FOUND_TEXT),
            Ok(people) => format!(
                "{}:\n{}",
                name,
                serde_json::to_string_pretty(&people).unwrap_or_default()
            ),
            Err(e) => {
                warn!("Catalog person lookup for '{}' failed: {}", name, e);
                format!("{}:\n{}", name, CATALOG_ERROR_TEXT)
            }
        }
    }
}

#[async_trait]
impl MovieTool for PeopleSearchByNameTool {
    fn kind(&self) -> ToolKind {
        ToolKind::PeopleSearchByName
    }

    fn description(&self) -> &'static str {
        "Finds information about actors, directors and other film people by their names. \
Returns a short biography of each person."
    }

    async fn invoke(&self, question: &str, context: &str, _user_id: i64) -> String {
        let kind = self.kind();
        let mut names = request_query(&self.router, kind, INSTRUCTIONS, question, context)
            .await
            .map(|raw| allowed_params(kind, raw, &["query"]))
            .and_then(|params| params.get("query").map(value_strings))
            .unwrap_or_default();
        if names.is_empty() {
            names.push(bare_subject(question).to_string());
        }
        debug!("Person lookup for {:?}", names);

        let mut sections = Vec::with_capacity(names.len());
        for name in &names {
            sections.push(self.describe(name).await);
        }

        phrase_answer(&self.router, kind, FIELD_NOTES, question, &sections.join("\n\n")).await
    }
}
