use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use shared::{
    domain::{FavoriteEntry, Rating, RecipeId, RecipeRecord, UserId},
    error::BotError,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Durable per-user favorites backed by a single SQLite table.
///
/// Writes to the same `(user, recipe)` pair are serialized through a keyed
/// lock map; reads and writes to other keys proceed without coordination.
#[derive(Clone)]
pub struct FavoritesStore {
    pool: Pool<Sqlite>,
    locks: Arc<KeyedLocks>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("recipe {recipe_id} is not in favorites of user {user_id}")]
    NotFavorited { user_id: UserId, recipe_id: RecipeId },
    #[error("rating {0} is outside the 1..=5 range")]
    InvalidRating(i64),
    #[error("favorites database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for BotError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFavorited { .. } => BotError::not_favorited(value.to_string()),
            StoreError::InvalidRating(_) => BotError::validation(value.to_string()),
            StoreError::Database(_) => BotError::transient(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyExists,
}

type FavoriteKey = (UserId, RecipeId);

#[derive(Default)]
struct KeyedLocks {
    slots: Mutex<HashMap<FavoriteKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    async fn lock(&self, key: FavoriteKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Idle slots are only referenced by the map itself.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl FavoritesStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool_options = if is_memory_url(database_url) {
            // Every connection to `:memory:` is a separate database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open favorites database '{database_url}'"))?;

        let store = Self {
            pool,
            locks: Arc::default(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorite_recipes (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL,
                recipe_id           TEXT NOT NULL,
                recipe_name         TEXT NOT NULL,
                recipe_image        TEXT,
                recipe_instructions TEXT,
                rating              INTEGER DEFAULT 0,
                added_date          TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, recipe_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure favorite_recipes table exists")?;

        let pragma_rows = sqlx::query("PRAGMA table_info(favorite_recipes)")
            .fetch_all(&self.pool)
            .await
            .context("failed to inspect favorite_recipes schema")?;

        let mut has_rating = false;
        for row in pragma_rows {
            let col_name: String = row.try_get("name")?;
            if col_name == "rating" {
                has_rating = true;
            }
        }

        if !has_rating {
            info!("favorite_recipes predates ratings; adding rating column");
            sqlx::query("ALTER TABLE favorite_recipes ADD COLUMN rating INTEGER DEFAULT 0")
                .execute(&self.pool)
                .await
                .context("failed adding rating column to favorite_recipes")?;
        }

        Ok(())
    }

    pub async fn add(&self, user_id: UserId, recipe: &RecipeRecord) -> Result<AddOutcome, StoreError> {
        let _guard = self.locks.lock((user_id, recipe.id.clone())).await;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO favorite_recipes
             (user_id, recipe_id, recipe_name, recipe_image, recipe_instructions, rating, added_date)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(user_id.0)
        .bind(recipe.id.as_str())
        .bind(&recipe.name)
        .bind(recipe.image.as_deref())
        .bind(&recipe.instructions)
        .bind(Utc::now().format(TIMESTAMP_FORMAT).to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(user_id = user_id.0, recipe_id = %recipe.id, "favorite already present");
            Ok(AddOutcome::AlreadyExists)
        } else {
            Ok(AddOutcome::Added)
        }
    }

    /// Returns whether an entry was actually removed.
    pub async fn remove(&self, user_id: UserId, recipe_id: &RecipeId) -> Result<bool, StoreError> {
        let _guard = self.locks.lock((user_id, recipe_id.clone())).await;
        let result = sqlx::query("DELETE FROM favorite_recipes WHERE user_id = ? AND recipe_id = ?")
            .bind(user_id.0)
            .bind(recipe_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(
        &self,
        user_id: UserId,
        recipe_id: &RecipeId,
    ) -> Result<Option<FavoriteEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, recipe_id, recipe_name, recipe_image, recipe_instructions, rating, added_date
             FROM favorite_recipes
             WHERE user_id = ? AND recipe_id = ?",
        )
        .bind(user_id.0)
        .bind(recipe_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(favorite_from_row).transpose()
    }

    /// Highest rating first; equal ratings show the most recently added first.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<FavoriteEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, recipe_id, recipe_name, recipe_image, recipe_instructions, rating, added_date
             FROM favorite_recipes
             WHERE user_id = ?
             ORDER BY rating DESC, added_date DESC, id DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(favorite_from_row).collect()
    }

    pub async fn count(&self, user_id: UserId) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorite_recipes WHERE user_id = ?")
            .bind(user_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn set_rating(
        &self,
        user_id: UserId,
        recipe_id: &RecipeId,
        rating: i64,
    ) -> Result<Rating, StoreError> {
        let rating = Rating::new(rating).ok_or(StoreError::InvalidRating(rating))?;

        let _guard = self.locks.lock((user_id, recipe_id.clone())).await;
        let result = sqlx::query(
            "UPDATE favorite_recipes SET rating = ? WHERE user_id = ? AND recipe_id = ?",
        )
        .bind(i64::from(rating.value()))
        .bind(user_id.0)
        .bind(recipe_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFavorited {
                user_id,
                recipe_id: recipe_id.clone(),
            });
        }
        Ok(rating)
    }
}

fn favorite_from_row(row: &SqliteRow) -> Result<FavoriteEntry, StoreError> {
    let added_at = match row.try_get::<Option<String>, _>("added_date")? {
        Some(raw) => parse_timestamp(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        None => DateTime::<Utc>::default(),
    };

    Ok(FavoriteEntry {
        user_id: UserId(row.try_get::<i64, _>("user_id")?),
        recipe_id: RecipeId(row.try_get::<String, _>("recipe_id")?),
        recipe_name: row.try_get::<String, _>("recipe_name")?,
        recipe_image: row.try_get::<Option<String>, _>("recipe_image")?,
        recipe_instructions: row.try_get::<Option<String>, _>("recipe_instructions")?,
        rating: Rating::from_stored(row.try_get::<Option<i64>, _>("rating")?.unwrap_or(0)),
        added_at,
    })
}

/// Accepts both SQLite's `CURRENT_TIMESTAMP` text and RFC 3339.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        Ok(naive) => Ok(Utc.from_utc_datetime(&naive)),
        Err(_) => DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)),
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
