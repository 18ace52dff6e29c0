//! Vector index of movie descriptions
//!
//! The pipeline only needs nearest-neighbour lookup by text; population is a
//! separate offline step (`reel index populate`). [`VectorIndex`] is the seam
//! the semantic search tool depends on, and [`chroma::ChromaIndex`] is the
//! HTTP-backed implementation.

use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod chroma;
pub mod populate;

pub use chroma::ChromaIndex;

/// Metadata key holding the movie title
pub const META_MOVIE_NAME: &str = "movie_name";
/// Metadata key holding the rendered movie card
pub const META_MOVIE_DATA: &str = "movie_data";

/// A document to store: embedded text plus string metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// One nearest-neighbour result. Smaller distance means closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub distance: f64,
    pub metadata: BTreeMap<String, String>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The `top_k` nearest documents to `text`, closest first
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexHit>, EngineError>;

    /// Store documents; returns how many were added
    async fn add(&self, documents: Vec<IndexDocument>) -> Result<usize, EngineError>;
}
