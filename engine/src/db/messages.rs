use super::unix_now;
use anyhow::{Context, Result};
use sdk::MessageKind;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// A persisted conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub user_id: i64,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: i64,
}

fn message_from_row(r: &SqliteRow) -> Result<StoredMessage> {
    let kind: String = r.get("message_type");
    Ok(StoredMessage {
        id: r.get("id"),
        user_id: r.get("user_id"),
        kind: kind.parse().context("Corrupt message_type column")?,
        content: r.get("content"),
        created_at: r.get("created_at"),
    })
}

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, kind: MessageKind, content: &str) -> Result<StoredMessage> {
        let now = unix_now()?;

        let id = sqlx::query(
            "INSERT INTO messages (user_id, message_type, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(content)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to save message")?
        .last_insert_rowid();

        Ok(StoredMessage {
            id,
            user_id,
            kind,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Full log for a user in chronological order, optionally of one kind
    pub async fn list_for_user(
        &self,
        user_id: i64,
        kind: Option<MessageKind>,
    ) -> Result<Vec<StoredMessage>> {
        let rows = match kind {
            Some(kind) => sqlx::query(
                "SELECT id, user_id, message_type, content, created_at FROM messages WHERE user_id = ? AND message_type = ? ORDER BY id",
            )
            .bind(user_id)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                "SELECT id, user_id, message_type, content, created_at FROM messages WHERE user_id = ? ORDER BY id",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await,
        }
        .context("Failed to list messages")?;

        rows.iter().map(message_from_row).collect()
    }

    /// The last `limit` messages, oldest first
    pub async fn recent_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query(
            "SELECT id, user_id, message_type, content, created_at FROM messages WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recent messages")?;

        let mut messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }
}
