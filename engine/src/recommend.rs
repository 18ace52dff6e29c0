//! Batch recommendations
//!
//! Picks a few unseen movies for each active user from their positive
//! preferences, asks the LLM to present them as a friendly message and hands
//! the message to a [`Notifier`]. Users without usable preferences get a
//! random slice of the top-250 list instead.

use crate::catalog::genres::canonical_genre;
use crate::catalog::{describe_movie, CatalogClient, CatalogError, CatalogQuery, Movie};
use crate::db::{Preference, PreferenceRepository, User, UserRepository};
use crate::llm::router::LLMRouter;
use crate::llm::Message;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sdk::errors::EngineError;
use sdk::{PreferenceItem, PreferenceType};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Listing size used when drawing candidates for one preference
const CANDIDATE_LIMIT: u32 = 50;
/// Size of the catalog's top list
const TOP_LIST_SIZE: u32 = 250;

const MESSAGE_INSTRUCTIONS: &str = "You are a personal movie assistant who helps the user find films they will enjoy.\n\
You receive RECOMMENDATIONS: movies picked for the user, each with the preference that caused the pick when there is one.\n\
Write a friendly, personal message presenting the selection. For every movie explain why it was chosen, \
add a short description and its ratings when available.\n\
Finish by inviting the user to pick a movie or ask for more recommendations.";

/// Where finished recommendation messages go
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), EngineError>;
}

/// Outcome of recommending to one chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A message reached the notifier
    Sent,
    /// Neither the preferences nor the popular list produced a movie
    Nothing,
    /// No active user is registered for the chat
    UnknownChat,
}

/// A picked movie and the preference that led to it
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub movie: Movie,
    /// `None` for popular-list fallbacks
    pub reason: Option<Preference>,
}

/// Render the brief the LLM turns into a message
pub fn recommendation_brief(recommendations: &[Recommendation]) -> String {
    let mut out = String::new();
    for (i, rec) in recommendations.iter().enumerate() {
        let _ = writeln!(out, "## Recommendation {}", i + 1);
        if let Some(reason) = &rec.reason {
            let _ = writeln!(out, "Reason: {}", reason.sentence());
        }
        let _ = writeln!(out, "Movie:\n{}\n", describe_movie(&rec.movie));
    }
    out
}

fn db_err(e: anyhow::Error) -> EngineError {
    EngineError::Database(format!("{:#}", e))
}

pub struct RecommendationTask {
    router: Arc<LLMRouter>,
    catalog: Arc<CatalogClient>,
    users: UserRepository,
    preferences: PreferenceRepository,
    limit: usize,
    rng: Mutex<StdRng>,
}

impl RecommendationTask {
    pub fn new(
        router: Arc<LLMRouter>,
        catalog: Arc<CatalogClient>,
        users: UserRepository,
        preferences: PreferenceRepository,
        limit: usize,
    ) -> Self {
        Self {
            router,
            catalog,
            users,
            preferences,
            limit: limit.max(1),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fix the random source, for reproducible picks
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }

    /// Send recommendations to every active user.
    /// Returns how many messages went out; per-user failures are logged.
    pub async fn run(&self, notifier: &dyn Notifier) -> Result<usize, EngineError> {
        let users = self.users.list_active().await.map_err(db_err)?;
        info!("Preparing recommendations for {} users", users.len());

        let mut sent = 0;
        for user in users {
            match self.recommend_user(&user, notifier).await {
                Ok(Delivery::Sent) => sent += 1,
                Ok(outcome) => debug!("Chat {}: {:?}", user.chat_id, outcome),
                Err(e) => warn!("Recommendations for chat {} failed: {}", user.chat_id, e),
            }
        }
        Ok(sent)
    }

    /// Recommend to a single chat, reporting what happened
    pub async fn run_for_chat(
        &self,
        notifier: &dyn Notifier,
        chat_id: i64,
    ) -> Result<Delivery, EngineError> {
        let user = self.users.get_by_chat_id(chat_id).await.map_err(db_err)?;
        match user {
            Some(user) if user.is_active => self.recommend_user(&user, notifier).await,
            _ => Ok(Delivery::UnknownChat),
        }
    }

    async fn recommend_user(&self, user: &User, notifier: &dyn Notifier) -> Result<Delivery, EngineError> {
        let preferences = self
            .preferences
            .list_for_user(user.id)
            .await
            .map_err(db_err)?;

        let recommendations = self.pick(&preferences).await?;
        if recommendations.is_empty() {
            info!("Nothing to recommend to chat {}", user.chat_id);
            return Ok(Delivery::Nothing);
        }
        debug!(
            "Picked {} movies for chat {}",
            recommendations.len(),
            user.chat_id
        );

        let message = self.compose(&recommendations).await?;
        notifier.notify(user.chat_id, &message).await?;
        Ok(Delivery::Sent)
    }

    /// Personalised picks, falling back to the popular list
    pub async fn pick(&self, preferences: &[Preference]) -> Result<Vec<Recommendation>, EngineError> {
        let positive: Vec<Preference> = preferences
            .iter()
            .filter(|p| p.polarity == PreferenceType::Like)
            .cloned()
            .collect();
        let watched: HashSet<i64> = preferences
            .iter()
            .filter(|p| p.item == PreferenceItem::Movie)
            .filter_map(|p| p.catalog_id)
            .collect();

        let picks = self.personalised(positive, watched).await;
        if !picks.is_empty() {
            return Ok(picks);
        }

        let popular = self.popular().await?;
        Ok(popular
            .into_iter()
            .map(|movie| Recommendation {
                movie,
                reason: None,
            })
            .collect())
    }

    /// Round-robin over shuffled likes; a like that fails or runs dry leaves
    /// the rotation
    async fn personalised(
        &self,
        mut positive: Vec<Preference>,
        mut watched: HashSet<i64>,
    ) -> Vec<Recommendation> {
        self.with_rng(|rng| positive.shuffle(rng));
        let mut picks = Vec::new();

        while picks.len() < self.limit && !positive.is_empty() {
            let idx = picks.len() % positive.len();
            let pref = positive[idx].clone();

            let candidates = match self.candidates_for(&pref, &watched).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Dropping '{}' from rotation: {}", pref.item_name, e);
                    positive.remove(idx);
                    continue;
                }
            };

            let unseen: Vec<Movie> = candidates
                .into_iter()
                .filter(|m| !watched.contains(&m.id))
                .collect();
            let Some(movie) = self.with_rng(|rng| unseen.choose(rng).cloned()) else {
                debug!("'{}' has nothing left to recommend", pref.item_name);
                positive.remove(idx);
                continue;
            };

            watched.insert(movie.id);
            picks.push(Recommendation {
                movie,
                reason: Some(pref),
            });
        }
        picks
    }

    async fn candidates_for(
        &self,
        pref: &Preference,
        watched: &HashSet<i64>,
    ) -> Result<Vec<Movie>, CatalogError> {
        let base = CatalogQuery::movie_defaults(CANDIDATE_LIMIT);
        match pref.item {
            PreferenceItem::Movie => {
                let Some(id) = pref.catalog_id else {
                    return Ok(Vec::new());
                };
                let liked = self.catalog.movie_by_id(id).await?;
                let mut similar = Vec::new();
                for linked in liked.similar_movies.iter().filter(|m| !watched.contains(&m.id)) {
                    match self.catalog.movie_by_id(linked.id).await {
                        Ok(movie) => similar.push(movie),
                        Err(e) => debug!("Skipping similar movie {}: {}", linked.id, e),
                    }
                }
                Ok(similar)
            }
            PreferenceItem::Genre => {
                let genre = canonical_genre(&pref.item_name).unwrap_or(pref.item_name.as_str());
                self.catalog.list_movies(&base.with("genres.name", genre)).await
            }
            PreferenceItem::Actor | PreferenceItem::Director => {
                let Some(id) = pref.catalog_id else {
                    return Ok(Vec::new());
                };
                self.catalog
                    .list_movies(&base.with("persons.id", id.to_string()))
                    .await
            }
        }
    }

    /// A random page of the top-250 list
    async fn popular(&self) -> Result<Vec<Movie>, EngineError> {
        let limit = self.limit as u32;
        let pages = (TOP_LIST_SIZE / limit).max(1);
        let page = self.with_rng(|rng| rng.gen_range(1..=pages));

        let query = CatalogQuery::movie_defaults(limit)
            .with("lists", "top250")
            .with("page", page.to_string());
        Ok(self.catalog.list_movies(&query).await?)
    }

    /// Ask the LLM to present the picks
    pub async fn compose(&self, recommendations: &[Recommendation]) -> Result<String, EngineError> {
        let messages = [
            Message::system(MESSAGE_INSTRUCTIONS),
            Message::user(format!(
                "RECOMMENDATIONS:\n```\n{}\n```",
                recommendation_brief(recommendations)
            )),
        ];
        Ok(self.router.complete(&messages).await?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewPreference};
    use crate::test_support::{catalog_for, scripted_router};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _chat_id: i64, _text: &str) -> Result<(), EngineError> {
            Err(EngineError::Network("chat unreachable".into()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, chat_id: i64, text: &str) -> Result<(), EngineError> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    async fn task_for(
        server: &MockServer,
        replies: &[&str],
    ) -> (TempDir, Database, RecommendationTask, Arc<Mutex<Vec<Vec<Message>>>>) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("reel.db")).await.unwrap();
        let (router, prompts) = scripted_router(replies);
        let task = RecommendationTask::new(
            router,
            catalog_for(&server.uri()),
            db.users(),
            db.preferences(),
            2,
        )
        .with_seed(7);
        (dir, db, task, prompts)
    }

    #[tokio::test]
    async fn test_genre_like_drives_picks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.4/movie"))
            .and(query_param("genres.name", "боевик"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"docs": [
                {"id": 1, "name": "Крепкий орешек"},
                {"id": 2, "name": "Хищник"},
                {"id": 3, "name": "Терминатор"}
            ]})))
            .mount(&server)
            .await;

        let (_dir, db, task, prompts) = task_for(&server, &["Here are two action movies!"]).await;
        let user = db.users().create(100, "Ann").await.unwrap();
        db.preferences()
            .create(
                user.id,
                &NewPreference {
                    item_name: "action".into(),
                    item: PreferenceItem::Genre,
                    polarity: PreferenceType::Like,
                    catalog_id: None,
                },
            )
            .await
            .unwrap();

        let notifier = RecordingNotifier::default();
        assert_eq!(task.run(&notifier).await.unwrap(), 1);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(*sent, vec![(100, "Here are two action movies!".to_string())]);

        let brief = &prompts.lock().unwrap()[0][1].content;
        assert_eq!(brief.matches("Reason: User likes genre \"action\".").count(), 2);
    }

    #[tokio::test]
    async fn test_no_likes_falls_back_to_top_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.4/movie"))
            .and(query_param("lists", "top250"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"docs": [
                {"id": 10, "name": "Побег из Шоушенка"}
            ]})))
            .mount(&server)
            .await;

        let (_dir, db, task, prompts) = task_for(&server, &["A classic for you."]).await;
        db.users().create(200, "Bob").await.unwrap();

        let notifier = RecordingNotifier::default();
        assert_eq!(
            task.run_for_chat(&notifier, 200).await.unwrap(),
            Delivery::Sent
        );

        let brief = &prompts.lock().unwrap()[0][1].content;
        assert!(brief.contains("Побег из Шоушенка"));
        assert!(!brief.contains("Reason:"));
    }

    #[tokio::test]
    async fn test_watched_movies_are_not_recommended() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.4/movie/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5, "name": "Матрица", "similarMovies": [{"id": 6}, {"id": 7}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.4/movie/7"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "Тёмный город"})),
            )
            .mount(&server)
            .await;

        let (_dir, _db, task, _) = task_for(&server, &[]).await;
        let liked = |id: i64| Preference {
            id,
            user_id: 1,
            item_name: format!("movie {}", id),
            item: PreferenceItem::Movie,
            polarity: PreferenceType::Like,
            catalog_id: Some(id),
            created_at: 0,
        };

        let picks = task.pick(&[liked(5), liked(6)]).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].movie.id, 7);
    }

    #[tokio::test]
    async fn test_inactive_chat_is_skipped() {
        let server = MockServer::start().await;
        let (_dir, db, task, _) = task_for(&server, &[]).await;
        let user = db.users().create(300, "Eve").await.unwrap();
        db.users().set_active(user.id, false).await.unwrap();

        let notifier = RecordingNotifier::default();
        assert_eq!(
            task.run_for_chat(&notifier, 300).await.unwrap(),
            Delivery::UnknownChat
        );
        assert_eq!(
            task.run_for_chat(&notifier, 301).await.unwrap(),
            Delivery::UnknownChat
        );
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_top_list_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.4/movie"))
            .and(query_param("lists", "top250"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"docs": []})))
            .mount(&server)
            .await;

        let (_dir, db, task, prompts) = task_for(&server, &[]).await;
        db.users().create(400, "Kim").await.unwrap();

        let notifier = RecordingNotifier::default();
        assert_eq!(
            task.run_for_chat(&notifier, 400).await.unwrap(),
            Delivery::Nothing
        );
        assert_eq!(task.run(&notifier).await.unwrap(), 0);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_outage_is_an_error_for_registered_chat() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.4/movie"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (_dir, db, task, _) = task_for(&server, &[]).await;
        db.users().create(500, "Lee").await.unwrap();

        let notifier = RecordingNotifier::default();
        assert!(task.run_for_chat(&notifier, 500).await.is_err());
        assert_eq!(task.run(&notifier).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_undelivered_message_is_not_counted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.4/movie"))
            .and(query_param("lists", "top250"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"docs": [
                {"id": 10, "name": "Побег из Шоушенка"}
            ]})))
            .mount(&server)
            .await;

        let (_dir, db, task, _) = task_for(&server, &["A classic for you."]).await;
        db.users().create(600, "Max").await.unwrap();

        assert_eq!(task.run(&FailingNotifier).await.unwrap(), 0);
    }
}
