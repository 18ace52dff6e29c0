use super::unix_now;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// A chat user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub chat_id: i64,
    pub full_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: i64,
}

fn user_from_row(r: &SqliteRow) -> User {
    User {
        id: r.get("id"),
        chat_id: r.get("chat_id"),
        full_name: r.get("full_name"),
        is_active: r.get("is_active"),
        is_superuser: r.get("is_superuser"),
        created_at: r.get("created_at"),
    }
}

const USER_COLUMNS: &str = "id, chat_id, full_name, is_active, is_superuser, created_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new active, non-superuser user
    pub async fn create(&self, chat_id: i64, full_name: &str) -> Result<User> {
        let now = unix_now()?;

        let id = sqlx::query(
            "INSERT INTO users (chat_id, full_name, is_active, is_superuser, created_at) VALUES (?, ?, 1, 0, ?)",
        )
        .bind(chat_id)
        .bind(full_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?
        .last_insert_rowid();

        Ok(User {
            id,
            chat_id,
            full_name: full_name.to_string(),
            is_active: true,
            is_superuser: false,
            created_at: now,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn get_by_chat_id(&self, chat_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE chat_id = ?",
            USER_COLUMNS
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by chat id")?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// The user for `chat_id`, registering one on first contact
    pub async fn get_or_create(&self, chat_id: i64, full_name: &str) -> Result<User> {
        if let Some(user) = self.get_by_chat_id(chat_id).await? {
            return Ok(user);
        }
        tracing::info!("Registering new user for chat {}", chat_id);
        self.create(chat_id, full_name).await
    }

    pub async fn list_active(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE is_active = 1 ORDER BY id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active users")?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user activity")?;
        Ok(())
    }
}
