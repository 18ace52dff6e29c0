//! Fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use reel_engine::catalog::CatalogClient;
use reel_engine::config::{CatalogConfig, LLMConfig};
use reel_engine::db::Database;
use reel_engine::llm::router::LLMRouter;
use reel_engine::llm::{LLMError, LLMProvider, LLMResponse, Message, ResponseFormat};
use reel_engine::secrets::{SecretCache, SecretManager, SecretString, CATALOG_API_KEY};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub type Prompts = Arc<Mutex<Vec<Vec<Message>>>>;

/// LLM that replays canned replies in order and records what it was asked
pub struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    prompts: Prompts,
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
    ) -> reel_engine::llm::Result<LLMResponse> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop() {
            Some(text) => Ok(LLMResponse::new(text, "scripted")),
            None => Err(LLMError::ProviderUnavailable("script exhausted".into())),
        }
    }
}

pub fn scripted_router(replies: &[&str]) -> (Arc<LLMRouter>, Prompts) {
    let prompts: Prompts = Arc::new(Mutex::new(Vec::new()));
    let provider = ScriptedProvider {
        replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
        prompts: Arc::clone(&prompts),
    };
    let router = LLMRouter::new(vec![Box::new(provider)], Arc::new(LLMConfig::default()));
    (Arc::new(router), prompts)
}

/// Wrap a JSON plan the way the planner prompt asks for it
pub fn plan_reply(json: &str) -> String {
    format!("Let me think about which tools are needed.\n```json\n{}\n```", json)
}

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

pub async fn temp_db() -> (TempDir, Arc<Database>) {
    let dir = TempDir::new().unwrap();
    let db = Database::new(&dir.path().join("reel.db")).await.unwrap();
    (dir, Arc::new(db))
}

/// Text of the last message in the `n`-th recorded prompt
pub fn last_content(prompts: &Prompts, n: usize) -> String {
    let prompts = prompts.lock().unwrap();
    prompts[n].last().map(|m| m.content.clone()).unwrap_or_default()
}
