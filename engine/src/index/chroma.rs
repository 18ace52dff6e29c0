use super::{IndexDocument, IndexHit, VectorIndex};
use crate::config::IndexConfig;
use crate::llm::openai::OpenAIEmbeddings;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::OnceCell;

/// [`VectorIndex`] backed by a Chroma server's v1 REST API.
///
/// Embeddings are computed client-side so queries and stored documents share
/// one model. The collection is created on first use with cosine distance.
pub struct ChromaIndex {
    base_url: String,
    collection: String,
    collection_id: OnceCell<String>,
    embeddings: OpenAIEmbeddings,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    distances: Vec<Vec<f64>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<BTreeMap<String, serde_json::Value>>>>,
}

fn index_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::VectorIndex(e.to_string())
}

impl ChromaIndex {
    pub fn new(config: &IndexConfig, embeddings: OpenAIEmbeddings) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            collection_id: OnceCell::new(),
            embeddings: embeddings.with_timeout(timeout),
            client,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, EngineError> {
        let response = self
            .client
            .post(format!("{}/api/v1{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(index_err)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::VectorIndex(format!("HTTP {}: {}", status, text)));
        }
        Ok(response)
    }

    async fn collection_id(&self) -> Result<&str, EngineError> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let info: CollectionInfo = self
                    .post(
                        "/collections",
                        json!({
                            "name": self.collection,
                            "get_or_create": true,
                            "metadata": {"hnsw:space": "cosine"}
                        }),
                    )
                    .await?
                    .json()
                    .await
                    .map_err(index_err)?;
                tracing::debug!("Using vector collection '{}' ({})", self.collection, info.id);
                Ok::<_, EngineError>(info.id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        self.embeddings.embed(texts).await.map_err(index_err)
    }
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexHit>, EngineError> {
        let embedding = self.embed(&[text.to_string()]).await?;
        let id = self.collection_id().await?;

        let response: QueryResponse = self
            .post(
                &format!("/collections/{}/query", id),
                json!({
                    "query_embeddings": embedding,
                    "n_results": top_k,
                    "include": ["metadatas", "distances"]
                }),
            )
            .await?
            .json()
            .await
            .map_err(index_err)?;

        let distances = response.distances.into_iter().next().unwrap_or_default();
        let metadatas = response.metadatas.into_iter().next().unwrap_or_default();

        Ok(distances
            .into_iter()
            .zip(metadatas.into_iter().chain(std::iter::repeat(None)))
            .map(|(distance, metadata)| IndexHit {
                distance,
                metadata: metadata
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| match v {
                        serde_json::Value::String(s) => (k, s),
                        other => (k, other.to_string()),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn add(&self, documents: Vec<IndexDocument>) -> Result<usize, EngineError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embed(&texts).await?;
        let id = self.collection_id().await?;

        let count = documents.len();
        let (ids, metadatas): (Vec<_>, Vec<_>) =
            documents.into_iter().map(|d| (d.id, d.metadata)).unzip();

        self.post(
            &format!("/collections/{}/add", id),
            json!({
                "ids": ids,
                "embeddings": embeddings,
                "metadatas": metadatas,
                "documents": texts,
            }),
        )
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAIConfig;
    use crate::secrets::{SecretCache, SecretManager, SecretString, OPENAI_API_KEY};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn index_for(server: &MockServer) -> ChromaIndex {
        let cache = SecretCache::new(Arc::new(SecretManager::new("reel-chroma-test")));
        cache.insert(OPENAI_API_KEY, SecretString::new("k")).unwrap();
        let embeddings = OpenAIEmbeddings::new(
            &OpenAIConfig {
                base_url: server.uri(),
                ..OpenAIConfig::default()
            },
            Arc::new(cache),
        );

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.1, 0.2]}]
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/collections"))
            .and(body_partial_json(json!({"name": "movies", "get_or_create": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "c-1", "name": "movies"})),
            )
            .expect(1)
            .mount(server)
            .await;

        ChromaIndex::new(
            &IndexConfig {
                base_url: server.uri(),
                ..IndexConfig::default()
            },
            embeddings,
        )
    }

    #[tokio::test]
    async fn test_query_returns_hits() {
        let server = MockServer::start().await;
        let index = index_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/collections/c-1/query"))
            .and(body_partial_json(json!({"n_results": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ids": [["m1"]],
                "distances": [[0.31]],
                "metadatas": [[{"movie_name": "Зеленая миля", "movie_data": "Title: Зеленая миля"}]]
            })))
            .mount(&server)
            .await;

        let hits = index.query("prison guard and a gentle giant", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 0.31).abs() < f64::EPSILON);
        assert_eq!(hits[0].metadata["movie_name"], "Зеленая миля");

        // collection id is resolved once and reused
        index.query("again", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_posts_documents() {
        let server = MockServer::start().await;
        let index = index_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/collections/c-1/add"))
            .and(body_partial_json(json!({"ids": ["301"], "documents": ["about"]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        let added = index
            .add(vec![IndexDocument {
                id: "301".into(),
                text: "about".into(),
                metadata: BTreeMap::from([("movie_name".to_string(), "Матрица".to_string())]),
            }])
            .await
            .unwrap();
        assert_eq!(added, 1);
    }

    #[tokio::test]
    async fn test_slow_embeddings_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"index": 0, "embedding": [0.1]}]}))
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let cache = SecretCache::new(Arc::new(SecretManager::new("reel-chroma-test")));
        cache.insert(OPENAI_API_KEY, SecretString::new("k")).unwrap();
        let embeddings = OpenAIEmbeddings::new(
            &OpenAIConfig {
                base_url: server.uri(),
                ..OpenAIConfig::default()
            },
            Arc::new(cache),
        );
        let index = ChromaIndex::new(
            &IndexConfig {
                base_url: server.uri(),
                timeout_secs: 1,
                ..IndexConfig::default()
            },
            embeddings,
        );

        let started = std::time::Instant::now();
        assert!(index.query("anything", 1).await.is_err());
        assert!(started.elapsed() < std::time::Duration::from_secs(4));
    }
}
