//! Person summaries from a MediaWiki encyclopedia.
//!
//! Two requests per lookup: a full-text search for the best page title, then
//! the plain-text intro of that page. Pages that do not mention a film
//! profession are discarded so a namesake politician or footballer does not
//! answer a question about an actor.

use crate::config::EncyclopediaConfig;
use sdk::errors::EngineError;
use serde_json::Value;
use std::time::Duration;

/// Fragment returned when no usable page exists
pub const PERSON_NOT_FOUND_TEXT: &str =
    "No information about this person was found, or they are not from the film industry.";

const FILM_KEYWORDS: &[&str] = &[
    "actor",
    "actress",
    "director",
    "screenwriter",
    "producer",
    "filmmaker",
    "cinematographer",
    "film",
    "актёр",
    "актер",
    "актриса",
    "режиссёр",
    "режиссер",
    "сценарист",
    "продюсер",
    "кинооператор",
    "фильм",
    "кино",
];

pub struct EncyclopediaClient {
    base_url: String,
    client: reqwest::Client,
}

fn looks_like_film_person(extract: &str) -> bool {
    let lower = extract.to_lowercase();
    FILM_KEYWORDS.iter().any(|k| lower.contains(k))
}

impl EncyclopediaClient {
    pub fn new(config: &EncyclopediaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            base_url: config.base_url.clone(),
            client,
        }
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value, EngineError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("action", "query"), ("format", "json")])
            .query(params)
            .send()
            .await
            .map_err(|e| EngineError::Encyclopedia(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Encyclopedia(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Encyclopedia(e.to_string()))
    }

    /// Plain-text summary of the person's page, or `None` when nothing
    /// suitable is found
    pub async fn person_summary(&self, name: &str) -> Result<Option<String>, EngineError> {
        let search = self
            .query(&[("list", "search"), ("srsearch", name), ("srlimit", "1")])
            .await?;

        let Some(title) = search
            .pointer("/query/search/0/title")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            tracing::debug!("Encyclopedia has no page for '{}'", name);
            return Ok(None);
        };

        let pages = self
            .query(&[
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("exintro", "1"),
                ("titles", title.as_str()),
            ])
            .await?;

        let extract = pages
            .pointer("/query/pages")
            .and_then(Value::as_object)
            .and_then(|pages| pages.values().next())
            .and_then(|page| page.get("extract"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        if extract.is_empty() || !looks_like_film_person(extract) {
            tracing::debug!("Encyclopedia page '{}' is not a film person", title);
            return Ok(None);
        }

        Ok(Some(extract.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_with(server: &MockServer, extract: &str) -> EncyclopediaClient {
        Mock::given(method("GET"))
            .and(query_param("list", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"search": [{"title": "Киллиан Мерфи"}]}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("prop", "extracts"))
            .and(query_param("titles", "Киллиан Мерфи"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": {"123": {"title": "Киллиан Мерфи", "extract": extract}}}
            })))
            .mount(server)
            .await;

        EncyclopediaClient::new(&EncyclopediaConfig {
            base_url: format!("{}/w/api.php", server.uri()),
            ..EncyclopediaConfig::default()
        })
    }

    #[tokio::test]
    async fn test_film_person_summary() {
        let server = MockServer::start().await;
        let client =
            client_with(&server, "Киллиан Мерфи — ирландский актёр театра и кино.").await;

        let summary = client.person_summary("Киллиан Мерфи").await.unwrap();
        assert!(summary.unwrap().contains("ирландский актёр"));
    }

    #[tokio::test]
    async fn test_unrelated_page_is_discarded() {
        let server = MockServer::start().await;
        let client = client_with(&server, "Ирландский политик и экономист.").await;

        assert_eq!(client.person_summary("Киллиан Мерфи").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_search_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"query": {"search": []}})),
            )
            .mount(&server)
            .await;
        let client = EncyclopediaClient::new(&EncyclopediaConfig {
            base_url: server.uri(),
            ..EncyclopediaConfig::default()
        });

        assert_eq!(client.person_summary("Xyzzy").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"query": {"search": []}}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        let client = EncyclopediaClient::new(&EncyclopediaConfig {
            base_url: server.uri(),
            timeout_secs: 1,
            ..EncyclopediaConfig::default()
        });

        let started = std::time::Instant::now();
        let result = client.person_summary("Киллиан Мерфи").await;
        assert!(matches!(result, Err(EngineError::Encyclopedia(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
