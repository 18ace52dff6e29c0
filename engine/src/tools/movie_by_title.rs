use super::{
    allowed_params, bare_subject, phrase_answer, request_query, value_strings, MovieTool,
    ToolKind, CATALOG_ERROR_TEXT,
};
use crate::catalog::genres::DEFAULT_ITEM_TYPES;
use crate::catalog::{describe_movie, CatalogClient};
use crate::llm::router::LLMRouter;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

const INSTRUCTIONS: &str = "You extract the title of one movie or series from a question.\n\
Return a JSON object {\"query\": \"<title>\"} with the title as the user wrote it, without quotes or extra words.";

const FIELD_NOTES: &str = "One movie card: title, year, type, countries, genres, duration, \
MPAA rating, description and ratings from several sources.";

/// Looks up one title and answers from its card
pub struct MovieSearchByNameTool {
    router: Arc<LLMRouter>,
    catalog: Arc<CatalogClient>,
}

impl MovieSearchByNameTool {
    pub fn new(router: Arc<LLMRouter>, catalog: Arc<CatalogClient>) -> Self {
        Self { router, catalog }
    }
}

#[async_trait]
impl MovieTool for MovieSearchByNameTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MovieSearchByName
    }

    fn description(&self) -> &'static str {
        "Finds one movie or series by its title. Returns its year, type, countries, genres, \
duration, age rating, description and ratings."
    }

    async fn invoke(&self, question: &str, context: &str, _user_id: i64) -> String {
        let kind = self.kind();
        let title = request_query(&self.router, kind, INSTRUCTIONS, question, context)
            .await
            .map(|raw| allowed_params(kind, raw, &["query"]))
            .and_then(|params| params.get("query").and_then(|v| value_strings(v).into_iter().next()))
            .unwrap_or_else(|| bare_subject(question).to_string());
        debug!("Title lookup for '{}'", title);

        let movies = match self
            .catalog
            .search_movies_by_title(&title, 1, DEFAULT_ITEM_TYPES)
            .await
        {
            Ok(movies) => movies,
            Err(e) => {
                warn!("Title search failed: {}", e);
                return CATALOG_ERROR_TEXT.to_string();
            }
        };

        let Some(movie) = movies.first() else {
            return format!("No movie or series titled \"{}\" was found.", title);
        };

        phrase_answer(&self.router, kind, FIELD_NOTES, question, &describe_movie(movie)).await
    }
}
