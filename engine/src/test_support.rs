//! Shared fixtures for unit tests

use crate::catalog::CatalogClient;
use crate::config::{CatalogConfig, LLMConfig};
use crate::llm::router::LLMRouter;
use crate::llm::{LLMError, LLMProvider, LLMResponse, Message, ResponseFormat};
use crate::secrets::{SecretCache, SecretManager, SecretString, CATALOG_API_KEY};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Provider that answers from a script and records every prompt
pub struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    pub prompts: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, _tokens: usize) -> f64 {
        0.0
    }

    async fn generate(
        &self,
        messages: &[Message],
        _format: ResponseFormat,
    ) -> crate::llm::Result<LLMResponse> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop() {
            Some(text) => Ok(LLMResponse::new(text, "scripted")),
            None => Err(LLMError::ProviderUnavailable("script exhausted".into())),
        }
    }
}

/// Router over one scripted provider, plus a handle on the recorded prompts
pub fn scripted_router(replies: &[&str]) -> (Arc<LLMRouter>, Arc<Mutex<Vec<Vec<Message>>>>) {
    let provider = ScriptedProvider::new(replies);
    let prompts = Arc::clone(&provider.prompts);
    let router = LLMRouter::new(vec![Box::new(provider)], Arc::new(LLMConfig::default()));
    (Arc::new(router), prompts)
}

/// Catalog client pointed at a mock server, with a test key cached
pub fn catalog_for(base_url: &str) -> Arc<CatalogClient> {
    let cache = SecretCache::new(Arc::new(SecretManager::new("reel-test")));
    cache
        .insert(CATALOG_API_KEY, SecretString::new("TEST-KEY"))
        .unwrap();
    let config = CatalogConfig {
        base_url: base_url.to_string(),
        ..CatalogConfig::default()
    };
    Arc::new(CatalogClient::new(&config, Arc::new(cache)))
}
