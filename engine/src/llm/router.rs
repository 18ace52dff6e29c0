//! LLM Router
//!
//! Orders the configured providers and walks them with a per-call timeout
//! until one answers. Every LLM call in the engine goes through here, so the
//! pipeline code never needs to know which backend served a request.

use super::{parse_json_payload, LLMError, LLMProvider, LLMResponse, Message, ResponseFormat};
use crate::config::LLMConfig;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// LLM Router with ordered failover across providers
pub struct LLMRouter {
    /// Available LLM providers
    providers: Vec<Box<dyn LLMProvider>>,

    /// LLM configuration
    config: Arc<LLMConfig>,
}

impl LLMRouter {
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, config: Arc<LLMConfig>) -> Self {
        Self { providers, config }
    }

    /// Estimate token count for the conversation
    ///
    /// Uses a simple heuristic: ~4 characters per token
    fn estimate_tokens(&self, messages: &[Message]) -> usize {
        let total_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        total_chars / 4
    }

    /// Rank providers for a request.
    ///
    /// The configured default provider always comes first; the rest are
    /// ordered by estimated cost for this request, cheapest first.
    pub fn rank_providers(&self, messages: &[Message]) -> Vec<&dyn LLMProvider> {
        let tokens = self.estimate_tokens(messages);
        let default_provider = &self.config.default_provider;

        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        providers.sort_by(|a, b| {
            let a_default = a.name() == default_provider;
            let b_default = b.name() == default_provider;
            b_default.cmp(&a_default).then_with(|| {
                a.estimated_cost(tokens)
                    .partial_cmp(&b.estimated_cost(tokens))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        providers
    }

    /// Call LLM providers with automatic failover
    ///
    /// Attempts providers in ranked order, each bounded by
    /// `llm.timeout_secs`. Returns the response and the name of the provider
    /// that produced it.
    pub async fn call(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> super::Result<(LLMResponse, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut last_error = None;

        for provider in self.rank_providers(messages) {
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                timeout.as_secs()
            );

            match tokio::time::timeout(timeout, provider.generate(messages, format)).await {
                Ok(Ok(response)) => {
                    tracing::debug!("Provider {} succeeded", provider.name());
                    return Ok((response, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        timeout.as_secs()
                    );
                    last_error = Some(LLMError::Timeout);
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        match last_error {
            // A lone provider that timed out keeps its timeout identity
            Some(LLMError::Timeout) if self.providers.len() == 1 => Err(LLMError::Timeout),
            Some(e) => Err(LLMError::ProviderUnavailable(format!(
                "All LLM providers failed, last error: {}",
                e
            ))),
            None => Err(LLMError::ProviderUnavailable(
                "All LLM providers failed".to_string(),
            )),
        }
    }

    /// Free-text completion
    pub async fn complete(&self, messages: &[Message]) -> super::Result<String> {
        let (response, _) = self.call(messages, ResponseFormat::Text).await?;
        Ok(response.content)
    }

    /// Structured completion parsed into `T`.
    ///
    /// If the first reply does not parse, the model gets one follow-up turn
    /// quoting the parse error before the error is returned.
    pub async fn complete_json<T: DeserializeOwned>(&self, messages: &[Message]) -> super::Result<T> {
        let (response, _) = self.call(messages, ResponseFormat::Json).await?;
        let first_error = match parse_json_payload::<T>(&response.content) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        tracing::debug!("Structured reply did not parse, asking again: {}", first_error);

        let mut retry = messages.to_vec();
        retry.push(Message::assistant(response.content));
        retry.push(Message::user(format!(
            "Your previous reply could not be parsed ({}). Reply with a single JSON object only.",
            first_error
        )));

        let (response, _) = self.call(&retry, ResponseFormat::Json).await?;
        parse_json_payload(&response.content)
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockProvider {
        name: String,
        is_local: bool,
        cost_per_1k: f64,
        replies: Mutex<Vec<super::super::Result<String>>>,
        delay: Option<Duration>,
    }

    impl MockProvider {
        fn new(name: &str, is_local: bool, cost_per_1k: f64) -> Self {
            Self {
                name: name.to_string(),
                is_local,
                cost_per_1k,
                replies: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn replying(mut self, replies: Vec<super::super::Result<String>>) -> Self {
            self.replies = Mutex::new(replies.into_iter().rev().collect());
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl LLMProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_local(&self) -> bool {
            self.is_local
        }

        fn estimated_cost(&self, tokens: usize) -> f64 {
            (tokens as f64 / 1000.0) * self.cost_per_1k
        }

        async fn generate(
            &self,
            _messages: &[Message],
            _format: ResponseFormat,
        ) -> super::super::Result<LLMResponse> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.replies.lock().unwrap().pop();
            match next {
                Some(Ok(text)) => Ok(LLMResponse::new(text, "mock")),
                Some(Err(e)) => Err(e),
                None => Err(LLMError::ProviderUnavailable("no scripted reply".into())),
            }
        }
    }

    fn config(default_provider: &str, timeout_secs: u64) -> Arc<LLMConfig> {
        Arc::new(LLMConfig {
            default_provider: default_provider.to_string(),
            timeout_secs,
            ..LLMConfig::default()
        })
    }

    #[test]
    fn test_estimate_tokens() {
        let router = LLMRouter::new(vec![], config("openai", 5));
        let tokens = router.estimate_tokens(&[Message::user("This is a test message")]);
        assert!((5..=6).contains(&tokens));
    }

    #[test]
    fn test_default_provider_ranks_first() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(MockProvider::new("ollama", true, 0.0)),
            Box::new(MockProvider::new("openai", false, 0.002)),
        ];
        let router = LLMRouter::new(providers, config("openai", 5));

        let ranked = router.rank_providers(&[Message::user("hello")]);
        assert_eq!(ranked[0].name(), "openai");
        assert_eq!(ranked[1].name(), "ollama");
    }

    #[test]
    fn test_rank_providers_consider_cost() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(MockProvider::new("expensive", false, 0.010)),
            Box::new(MockProvider::new("cheap", false, 0.001)),
            Box::new(MockProvider::new("medium", false, 0.005)),
        ];
        let router = LLMRouter::new(providers, config("none", 5));

        let long = "word ".repeat(2000);
        let ranked = router.rank_providers(&[Message::user(long)]);
        assert_eq!(ranked[0].name(), "cheap");
        assert_eq!(ranked[1].name(), "medium");
        assert_eq!(ranked[2].name(), "expensive");
    }

    #[tokio::test]
    async fn test_failover_to_next_provider() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(
                MockProvider::new("openai", false, 0.002)
                    .replying(vec![Err(LLMError::RateLimitExceeded)]),
            ),
            Box::new(MockProvider::new("ollama", true, 0.0).replying(vec![Ok("fine".into())])),
        ];
        let router = LLMRouter::new(providers, config("openai", 5));

        let (response, provider) = router
            .call(&[Message::user("hi")], ResponseFormat::Text)
            .await
            .unwrap();
        assert_eq!(response.content, "fine");
        assert_eq!(provider, "ollama");
    }

    #[tokio::test]
    async fn test_single_provider_timeout() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![Box::new(
            MockProvider::new("openai", false, 0.002)
                .replying(vec![Ok("late".into())])
                .slow(Duration::from_secs(3)),
        )];
        let router = LLMRouter::new(providers, config("openai", 1));

        let err = router.complete(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LLMError::Timeout));
    }

    #[tokio::test]
    async fn test_no_providers() {
        let router = LLMRouter::new(vec![], config("openai", 5));
        let err = router.complete(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LLMError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_complete_json_retries_once() {
        #[derive(serde::Deserialize)]
        struct Query {
            query: String,
        }

        let providers: Vec<Box<dyn LLMProvider>> = vec![Box::new(
            MockProvider::new("openai", false, 0.002).replying(vec![
                Ok("I think the film is Heat".into()),
                Ok("{\"query\": \"Heat\"}".into()),
            ]),
        )];
        let router = LLMRouter::new(providers, config("openai", 5));

        let q: Query = router
            .complete_json(&[Message::user("find Heat")])
            .await
            .unwrap();
        assert_eq!(q.query, "Heat");
    }
}
