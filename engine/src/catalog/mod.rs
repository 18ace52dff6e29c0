//! Movie catalog HTTP client
//!
//! Thin typed wrapper over the catalog's `/v1.4` REST API. Requests carry the
//! `X-API-KEY` header from the secret store; query parameters are a
//! multi-map so array filters go out as repeated keys
//! (`genres.name=драма&genres.name=!ужасы`).
//!
//! Callers inside the pipeline never show a [`CatalogError`] to a user: tools
//! log it and substitute [`CATALOG_ERROR_TEXT`].

pub mod genres;
pub mod model;

pub use model::{describe_movie, top_reviews, Movie, Review};

use crate::config::CatalogConfig;
use crate::secrets::{SecretCache, CATALOG_API_KEY};
use model::Page;
use sdk::errors::EngineError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Text tools return in place of a result when the catalog cannot be reached
pub const CATALOG_ERROR_TEXT: &str = "An error occurred while contacting the movie database.";

/// Default vote floor applied to movie listings
pub const DEFAULT_VOTE_FLOOR: &str = "10000-99999999999";

/// Fields requested from movie listing endpoints
pub const MOVIE_SELECT_FIELDS: &[&str] = &[
    "id",
    "type",
    "name",
    "rating",
    "description",
    "votes",
    "year",
    "genres",
    "countries",
    "enName",
    "movieLength",
    "ratingMpaa",
    "shortDescription",
    "releaseYears",
    "isSeries",
    "seriesLength",
    "totalSeriesLength",
];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("catalog request failed: {0}")]
    Network(String),

    #[error("unexpected catalog response: {0}")]
    Parse(String),

    #[error("catalog API key unavailable: {0}")]
    MissingKey(String),
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        EngineError::CatalogApi(err.to_string())
    }
}

/// Ordered multi-map of query parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    params: Vec<(String, String)>,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default movie listing: top-rated movies and series above the vote floor
    pub fn movie_defaults(limit: u32) -> Self {
        Self::new()
            .with("page", "1")
            .with("limit", limit.to_string())
            .with_all("type", genres::DEFAULT_ITEM_TYPES.iter().copied())
            .with("sortField", "rating.kp")
            .with("sortType", "-1")
            .with("votes.kp", DEFAULT_VOTE_FLOOR)
            .with_all("selectFields", MOVIE_SELECT_FIELDS.iter().copied())
    }

    /// Replace every value of `key` with `value`
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Replace every value of `key` with `values`
    pub fn with_all<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove(key);
        for value in values {
            self.push(key, value);
        }
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.remove(key);
        self.push(key, value);
    }

    /// Add one more value for `key`
    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.params.push((key.to_string(), value.into()));
    }

    pub fn remove(&mut self, key: &str) {
        self.params.retain(|(k, _)| k != key);
    }

    pub fn get(&self, key: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Client for the movie catalog
pub struct CatalogClient {
    base_url: String,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
    search_limit: u32,
    people_limit: u32,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig, secret_cache: Arc<SecretCache>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_cache,
            client,
            search_limit: config.search_limit,
            people_limit: config.people_limit,
        }
    }

    pub fn search_limit(&self) -> u32 {
        self.search_limit
    }

    pub fn people_limit(&self) -> u32 {
        self.people_limit
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &CatalogQuery,
    ) -> Result<T, CatalogError> {
        let api_key = self
            .secret_cache
            .get_secret(CATALOG_API_KEY)
            .map_err(|e| CatalogError::MissingKey(e.to_string()))?;

        let url = format!("{}/v1.4{}", self.base_url, path);
        tracing::debug!("Catalog GET {} ({} params)", path, query.pairs().len());

        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", api_key.unsecure())
            .header("accept", "application/json")
            .query(query.pairs())
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    async fn docs<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &CatalogQuery,
    ) -> Result<Vec<T>, CatalogError> {
        let page: Page<T> = self.get_json(path, query).await?;
        Ok(page.docs)
    }

    /// Title search over the given item types, best match first
    pub async fn search_movies_by_title(
        &self,
        title: &str,
        limit: u32,
        item_types: &[&str],
    ) -> Result<Vec<Movie>, CatalogError> {
        let query = CatalogQuery::movie_defaults(limit)
            .with_all("type", item_types.iter().copied())
            .with("query", title);
        self.docs("/movie/search", &query).await
    }

    /// Filtered movie listing
    pub async fn list_movies(&self, query: &CatalogQuery) -> Result<Vec<Movie>, CatalogError> {
        self.docs("/movie", query).await
    }

    /// Full movie document, including `similarMovies` and `persons`
    pub async fn movie_by_id(&self, id: i64) -> Result<Movie, CatalogError> {
        self.get_json(&format!("/movie/{}", id), &CatalogQuery::new())
            .await
    }

    /// Structured person search; documents keep whatever projection was asked for
    pub async fn search_people(&self, query: &CatalogQuery) -> Result<Vec<Value>, CatalogError> {
        self.docs("/person", query).await
    }

    pub async fn search_people_by_name(
        &self,
        name: &str,
        limit: u32,
    ) -> Result<Vec<Value>, CatalogError> {
        let query = CatalogQuery::new()
            .with("page", "1")
            .with("limit", limit.to_string())
            .with("query", name);
        self.docs("/person/search", &query).await
    }

    /// Up to 100 reviews of a movie, newest first
    pub async fn reviews(&self, movie_id: i64) -> Result<Vec<Review>, CatalogError> {
        let query = CatalogQuery::new()
            .with("page", "1")
            .with("limit", "100")
            .with("movieId", movie_id.to_string())
            .with("sortField", "createdAt")
            .with("sortType", "-1");
        self.docs("/review", &query).await
    }

    /// Catalog id of the best title match across all item types
    pub async fn resolve_movie_id(&self, title: &str) -> Result<Option<i64>, CatalogError> {
        let movies = self
            .search_movies_by_title(title, 1, genres::ITEM_TYPES)
            .await?;
        Ok(movies.first().map(|m| m.id))
    }

    /// Catalog id of the best person match
    pub async fn resolve_person_id(&self, name: &str) -> Result<Option<i64>, CatalogError> {
        let people = self.search_people_by_name(name, 1).await?;
        Ok(people
            .first()
            .and_then(|p| p.get("id"))
            .and_then(Value::as_i64))
    }
}
