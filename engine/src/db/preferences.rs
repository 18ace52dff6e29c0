use super::unix_now;
use anyhow::{Context, Result};
use sdk::{PreferenceItem, PreferenceType};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// A stored like or dislike
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub id: i64,
    pub user_id: i64,
    pub item_name: String,
    pub item: PreferenceItem,
    pub polarity: PreferenceType,
    /// Catalog id for movies and people; genres have none
    pub catalog_id: Option<i64>,
    pub created_at: i64,
}

impl Preference {
    /// One-sentence summary, e.g. `User likes genre "action".`
    pub fn sentence(&self) -> String {
        let verb = match self.polarity {
            PreferenceType::Like => "likes",
            PreferenceType::Dislike => "dislikes",
        };
        format!("User {} {} \"{}\".", verb, self.item.as_str(), self.item_name)
    }
}

/// Preference ready to be stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPreference {
    pub item_name: String,
    pub item: PreferenceItem,
    pub polarity: PreferenceType,
    pub catalog_id: Option<i64>,
}

fn preference_from_row(r: &SqliteRow) -> Result<Preference> {
    let item: String = r.get("preference_item");
    let polarity: String = r.get("preference_type");
    Ok(Preference {
        id: r.get("id"),
        user_id: r.get("user_id"),
        item_name: r.get("item_name"),
        item: item.parse().context("Corrupt preference_item column")?,
        polarity: polarity.parse().context("Corrupt preference_type column")?,
        catalog_id: r.get("catalog_id"),
        created_at: r.get("created_at"),
    })
}

#[derive(Clone)]
pub struct PreferenceRepository {
    pool: SqlitePool,
}

impl PreferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, pref: &NewPreference) -> Result<Preference> {
        let now = unix_now()?;

        let id = sqlx::query(
            "INSERT INTO user_preferences (user_id, item_name, preference_item, preference_type, catalog_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&pref.item_name)
        .bind(pref.item.as_str())
        .bind(pref.polarity.as_str())
        .bind(pref.catalog_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to save preference")?
        .last_insert_rowid();

        Ok(Preference {
            id,
            user_id,
            item_name: pref.item_name.clone(),
            item: pref.item,
            polarity: pref.polarity,
            catalog_id: pref.catalog_id,
            created_at: now,
        })
    }

    /// Insert a batch atomically; returns the number of rows written
    pub async fn create_many(&self, user_id: i64, prefs: &[NewPreference]) -> Result<usize> {
        if prefs.is_empty() {
            return Ok(0);
        }
        let now = unix_now()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        for pref in prefs {
            sqlx::query(
                "INSERT INTO user_preferences (user_id, item_name, preference_item, preference_type, catalog_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(&pref.item_name)
            .bind(pref.item.as_str())
            .bind(pref.polarity.as_str())
            .bind(pref.catalog_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to save preference")?;
        }
        tx.commit().await.context("Failed to commit preferences")?;

        Ok(prefs.len())
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Preference>> {
        let rows = sqlx::query(
            "SELECT id, user_id, item_name, preference_item, preference_type, catalog_id, created_at FROM user_preferences WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list preferences")?;

        rows.iter().map(preference_from_row).collect()
    }

    /// Delete one preference; returns whether it existed
    pub async fn remove(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_preferences WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to remove preference")?;
        Ok(result.rows_affected() > 0)
    }
}
