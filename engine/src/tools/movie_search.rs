//! Filtered movie search
//!
//! The model turns a free-text request ("Soviet comedies from the 70s rated
//! above 7") into catalog filters. Filter values are normalised before the
//! request goes out: item types outside the catalog vocabulary are dropped,
//! and genre names are mapped to catalog spelling with a `!` prefix kept for
//! exclusions.

use super::{
    allowed_params, apply_params, phrase_answer, request_query, MovieTool, ToolKind,
    CATALOG_ERROR_TEXT, TOOL_FAILURE_TEXT,
};
use crate::catalog::genres::{canonical_genre, is_item_type, GENRE_NAMES, ITEM_TYPES};
use crate::catalog::{describe_movie, CatalogClient, CatalogQuery};
use crate::llm::router::LLMRouter;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

const ALLOWED_PARAMS: &[&str] = &[
    "type",
    "genres.name",
    "countries.name",
    "year",
    "rating.kp",
    "rating.imdb",
    "movieLength",
    "seriesLength",
    "ageRating",
    "isSeries",
    "sortField",
    "sortType",
];

const FIELD_NOTES: &str = "A list of movie cards: title, year, type, countries, genres, duration, \
MPAA rating, description and ratings from several sources.";

fn instructions() -> String {
    format!(
        "You turn a movie search request into catalog filters.\n\
Return a JSON object whose keys are catalog parameters and whose values are strings or arrays of strings.\n\
Supported parameters:\n\
- \"type\": item types, any of {types}\n\
- \"genres.name\": genres; prefix a genre with \"!\" to exclude it. Known genres: {genres}\n\
- \"countries.name\": production countries, e.g. \"США\", \"Россия\"; \"!\" excludes\n\
- \"year\": a year or a range such as \"1990-1999\"\n\
- \"rating.kp\", \"rating.imdb\": rating ranges such as \"7-10\"\n\
- \"movieLength\", \"seriesLength\": duration in minutes, a number or a range\n\
- \"ageRating\": minimum viewer age range such as \"0-12\"\n\
- \"isSeries\": \"true\" or \"false\"\n\
- \"sortField\", \"sortType\": sort field (e.g. \"rating.kp\", \"year\") and \"1\" or \"-1\"\n\
Only include parameters the request mentions.",
        types = ITEM_TYPES.join(", "),
        genres = GENRE_NAMES.join(", "),
    )
}

/// Normalise model-chosen filter values; entries that cannot be used vanish
fn normalise_filters(mut params: Map<String, Value>) -> Map<String, Value> {
    if let Some(types) = params.remove("type") {
        let kept: Vec<Value> = super::value_strings(&types)
            .into_iter()
            .filter(|t| {
                let ok = is_item_type(t);
                if !ok {
                    warn!("Dropping unknown item type '{}'", t);
                }
                ok
            })
            .map(Value::String)
            .collect();
        if !kept.is_empty() {
            params.insert("type".into(), Value::Array(kept));
        }
    }

    if let Some(genres) = params.remove("genres.name") {
        let kept: Vec<Value> = super::value_strings(&genres)
            .into_iter()
            .filter_map(|g| {
                let (negated, name) = match g.strip_prefix('!') {
                    Some(rest) => (true, rest),
                    None => (false, g.as_str()),
                };
                match canonical_genre(name) {
                    Some(canonical) if negated => Some(format!("!{}", canonical)),
                    Some(canonical) => Some(canonical.to_string()),
                    None => {
                        warn!("Dropping unknown genre '{}'", g);
                        None
                    }
                }
            })
            .map(Value::String)
            .collect();
        if !kept.is_empty() {
            params.insert("genres.name".into(), Value::Array(kept));
        }
    }

    params
}

pub struct MoviesSearchTool {
    router: Arc<LLMRouter>,
    catalog: Arc<CatalogClient>,
}

impl MoviesSearchTool {
    pub fn new(router: Arc<LLMRouter>, catalog: Arc<CatalogClient>) -> Self {
        Self { router, catalog }
    }
}

#[async_trait]
impl MovieTool for MoviesSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MoviesSearch
    }

    fn description(&self) -> &'static str {
        "Finds movies and series by filters: genres (including or excluding), countries, \
years, ratings, duration, item type. Use it for lists and recommendations that are not tied \
to a single known title. Returns movie cards with descriptions and ratings."
    }

    async fn invoke(&self, question: &str, context: &str, _user_id: i64) -> String {
        let kind = self.kind();
        let Some(raw) =
            request_query(&self.router, kind, &instructions(), question, context).await
        else {
            return TOOL_FAILURE_TEXT.to_string();
        };

        let params = normalise_filters(allowed_params(kind, raw, ALLOWED_PARAMS));
        let query = apply_params(CatalogQuery::movie_defaults(self.catalog.search_limit()), &params);

        let movies = match self.catalog.list_movies(&query).await {
            Ok(movies) => movies,
            Err(e) => {
                warn!("Movie search failed: {}", e);
                return CATALOG_ERROR_TEXT.to_string();
            }
        };
        info!("Movie search returned {} results", movies.len());

        let info = if movies.is_empty() {
            "No movies match these filters.".to_string()
        } else {
            movies
                .iter()
                .map(describe_movie)
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        phrase_answer(&self.router, kind, FIELD_NOTES, question, &info).await
    }
}
