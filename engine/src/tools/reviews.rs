use super::{bare_subject, MovieTool, ToolKind, CATALOG_ERROR_TEXT, TOOL_FAILURE_TEXT};
use crate::catalog::{top_reviews, CatalogClient};
use crate::llm::router::LLMRouter;
use crate::llm::Message;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

const SUMMARY_INSTRUCTIONS: &str = "You summarise audience reviews of a movie.\n\
Describe what viewers praise and criticise, and the overall impression, in one or two short paragraphs.\n\
Mention the movie title. Answer in the language of the question.";

/// Summarises the most helpful audience reviews of one title.
///
/// The planner is told to pass the bare title as the question.
pub struct ReviewsSummarizerTool {
    router: Arc<LLMRouter>,
    catalog: Arc<CatalogClient>,
    review_limit: usize,
}

impl ReviewsSummarizerTool {
    pub fn new(router: Arc<LLMRouter>, catalog: Arc<CatalogClient>, review_limit: usize) -> Self {
        Self {
            router,
            catalog,
            review_limit,
        }
    }
}

#[async_trait]
impl MovieTool for ReviewsSummarizerTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MovieReviewsSummarizer
    }

    fn description(&self) -> &'static str {
        "Summarises what viewers say about one movie or series. The question must be only \
the exact title, nothing else. Returns a summary of the most helpful reviews."
    }

    async fn invoke(&self, question: &str, _context: &str, _user_id: i64) -> String {
        let title = bare_subject(question);

        let movie_id = match self.catalog.resolve_movie_id(title).await {
            Ok(Some(id)) => id,
            Ok(None) => return format!("No movie or series titled \"{}\" was found.", title),
            Err(e) => {
                warn!("Review title lookup failed: {}", e);
                return CATALOG_ERROR_TEXT.to_string();
            }
        };

        let reviews = match self.catalog.reviews(movie_id).await {
            Ok(reviews) => reviews,
            Err(e) => {
                warn!("Review fetch for movie {} failed: {}", movie_id, e);
                return CATALOG_ERROR_TEXT.to_string();
            }
        };
        info!("Fetched {} reviews for movie {}", reviews.len(), movie_id);

        if reviews.is_empty() {
            return format!("No reviews were found for \"{}\".", title);
        }

        let messages = [
            Message::system(SUMMARY_INSTRUCTIONS),
            Message::user(format!(
                "MOVIE: {}\n\nREVIEWS:\n{}",
                title,
                top_reviews(reviews, self.review_limit)
            )),
        ];
        match self.router.complete(&messages).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                warn!("Review summary failed: {}", e);
                TOOL_FAILURE_TEXT.to_string()
            }
        }
    }
}
