//! Chat front end
//!
//! [`DialogueService`] is the transport-independent part: register users,
//! persist both sides of the conversation, and run the agent over the recent
//! history. [`telegram::TelegramBot`] wraps it in Telegram long polling; the
//! CLI's `ask` command drives it directly.

pub mod telegram;

pub use telegram::TelegramBot;

use crate::agent::{build_state, Agent};
use crate::db::{Database, User};
use sdk::errors::EngineError;
use sdk::MessageKind;
use std::sync::Arc;
use tracing::debug;

fn db_err(e: anyhow::Error) -> EngineError {
    EngineError::Database(format!("{:#}", e))
}

pub struct DialogueService {
    db: Arc<Database>,
    agent: Arc<Agent>,
    history_limit: usize,
}

impl DialogueService {
    pub fn new(db: Arc<Database>, agent: Arc<Agent>, history_limit: usize) -> Self {
        Self {
            db,
            agent,
            history_limit,
        }
    }

    /// The user for `chat_id`, created on first contact
    pub async fn register(&self, chat_id: i64, full_name: &str) -> Result<User, EngineError> {
        self.db
            .users()
            .get_or_create(chat_id, full_name)
            .await
            .map_err(db_err)
    }

    /// Answer one inbound message.
    ///
    /// The human message is stored before the pipeline runs and the answer
    /// after it, so a failed run leaves the question in the history.
    pub async fn answer(&self, chat_id: i64, full_name: &str, text: &str) -> Result<String, EngineError> {
        let user = self.register(chat_id, full_name).await?;
        let messages = self.db.messages();

        messages
            .create(user.id, MessageKind::Human, text)
            .await
            .map_err(db_err)?;

        let history: Vec<(MessageKind, String)> = messages
            .recent_for_user(user.id, self.history_limit)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|m| (m.kind, m.content))
            .collect();
        let preferences = self
            .db
            .preferences()
            .list_for_user(user.id)
            .await
            .map_err(db_err)?;
        debug!(
            "Chat {}: {} history messages, {} preferences",
            chat_id,
            history.len(),
            preferences.len()
        );

        let state = build_state(&history, user.id, preferences, self.history_limit);
        let state = self.agent.invoke(state).await?;
        let answer = state.answer().unwrap_or_default().to_string();

        messages
            .create(user.id, MessageKind::Ai, &answer)
            .await
            .map_err(db_err)?;

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scripted_router;
    use crate::tools::ToolRegistry;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_answer_persists_both_sides() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("reel.db")).await.unwrap());
        let (router, prompts) = scripted_router(&[
            "```json\n{\"tasks\": []}\n```",
            "Hello, Ann!",
        ]);
        let agent = Arc::new(Agent::new(router, Arc::new(ToolRegistry::new()), 0));
        let service = DialogueService::new(Arc::clone(&db), agent, 5);

        let answer = service.answer(42, "Ann", "Hi!").await.unwrap();
        assert_eq!(answer, "Hello, Ann!");

        let user = db.users().get_by_chat_id(42).await.unwrap().unwrap();
        let log = db.messages().list_for_user(user.id, None).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, MessageKind::Human);
        assert_eq!(log[1].content, "Hello, Ann!");

        assert!(prompts.lock().unwrap()[0][1].content.contains("user: Hi!"));
    }

    #[tokio::test]
    async fn test_failed_run_keeps_question() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("reel.db")).await.unwrap());
        let (router, _) = scripted_router(&[]);
        let agent = Arc::new(Agent::new(router, Arc::new(ToolRegistry::new()), 0));
        let service = DialogueService::new(Arc::clone(&db), agent, 5);

        assert!(service.answer(42, "Ann", "Hi!").await.is_err());

        let user = db.users().get_by_chat_id(42).await.unwrap().unwrap();
        let log = db.messages().list_for_user(user.id, None).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].content, "Hi!");
    }
}
