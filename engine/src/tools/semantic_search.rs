use super::{MovieTool, ToolKind, CATALOG_ERROR_TEXT};
use crate::index::{VectorIndex, META_MOVIE_DATA};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fragment returned when no indexed description is close enough
pub const SEMANTIC_NOT_FOUND_TEXT: &str =
    "Unfortunately, no movie matching this description was found.";

/// Finds a movie from a vague description of its plot.
///
/// Returns the stored card of the nearest indexed movie as-is; a hit farther
/// than the distance threshold counts as no match.
pub struct SemanticSearchTool {
    index: Arc<dyn VectorIndex>,
    distance_threshold: f64,
}

impl SemanticSearchTool {
    pub fn new(index: Arc<dyn VectorIndex>, distance_threshold: f64) -> Self {
        Self {
            index,
            distance_threshold,
        }
    }
}

#[async_trait]
impl MovieTool for SemanticSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MovieSemanticSearch
    }

    fn description(&self) -> &'static str {
        "Finds a movie when the user does not know its title but remembers the plot, scenes \
or characters. Returns the card of the closest matching movie."
    }

    async fn invoke(&self, question: &str, _context: &str, _user_id: i64) -> String {
        let hits = match self.index.query(question, 1).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Semantic index query failed: {}", e);
                return CATALOG_ERROR_TEXT.to_string();
            }
        };

        let Some(hit) = hits.into_iter().next() else {
            return SEMANTIC_NOT_FOUND_TEXT.to_string();
        };
        debug!("Nearest indexed movie at distance {:.3}", hit.distance);

        if hit.distance > self.distance_threshold {
            return SEMANTIC_NOT_FOUND_TEXT.to_string();
        }

        hit.metadata
            .get(META_MOVIE_DATA)
            .cloned()
            .unwrap_or_else(|| SEMANTIC_NOT_FOUND_TEXT.to_string())
    }
}
