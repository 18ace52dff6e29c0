use super::{LLMError, LLMProvider, LLMResponse, Message, ResponseFormat};
use crate::config::OpenAIConfig;
use crate::secrets::{SecretCache, OPENAI_API_KEY};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Chat completions against any OpenAI-compatible endpoint
pub struct OpenAIProvider {
    config: OpenAIConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, secret_cache: Arc<SecretCache>) -> Self {
        Self {
            config,
            secret_cache,
            client: reqwest::Client::new(),
        }
    }
}

/// Map a non-success status to the matching [`LLMError`]
async fn error_for_status(response: reqwest::Response) -> LLMError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    match status.as_u16() {
        401 | 403 => LLMError::AuthenticationFailed(text),
        429 => LLMError::RateLimitExceeded,
        500..=599 => LLMError::ProviderUnavailable(format!("HTTP {}: {}", status, text)),
        _ => LLMError::InvalidRequest(text),
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        // Approx $0.002 per 1k tokens for gpt-4o-mini
        (tokens as f64 / 1000.0) * 0.002
    }

    async fn check_health(&self) -> bool {
        self.secret_cache.get_secret(OPENAI_API_KEY).is_ok()
    }

    async fn generate(&self, messages: &[Message], format: ResponseFormat) -> super::Result<LLMResponse> {
        let api_key = self
            .secret_cache
            .get_secret(OPENAI_API_KEY)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!("{}/chat/completions", self.config.base_url);

        let api_messages: Vec<_> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let mut payload = json!({
            "model": self.config.model,
            "messages": api_messages,
        });
        if format == ResponseFormat::Json {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| LLMError::ParseError("No message content in response".to_string()))?;

        let model = data
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(&self.config.model);

        Ok(LLMResponse::new(content, model))
    }
}

/// Text embeddings through the OpenAI embeddings endpoint.
///
/// Used by the vector index to embed both stored descriptions and queries,
/// so both sides always go through the same model.
pub struct OpenAIEmbeddings {
    base_url: String,
    model: String,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl OpenAIEmbeddings {
    pub fn new(config: &OpenAIConfig, secret_cache: Arc<SecretCache>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            model: config.embedding_model.clone(),
            secret_cache,
            client: reqwest::Client::new(),
        }
    }

    /// Bound every embedding request by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    /// Embed each input string, preserving order
    pub async fn embed(&self, inputs: &[String]) -> super::Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self
            .secret_cache
            .get_secret(OPENAI_API_KEY)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
            .json(&json!({ "model": self.model, "input": inputs }))
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        if body.data.len() != inputs.len() {
            return Err(LLMError::ParseError(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                body.data.len()
            )));
        }

        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}
