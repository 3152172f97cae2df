//! Durable storage for per-user sync cursors.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;

/// Repository for change-stream cursors, one per user.
///
/// Cursors are opaque: they are stored and replayed verbatim, never
/// compared ordinally. Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct CursorStore {
    pool: SqlitePool,
}

impl CursorStore {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema
    /// creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema
    /// creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sync_cursors (
                user_id TEXT PRIMARY KEY,
                cursor TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The stored cursor for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, user_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT cursor FROM sync_cursors WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("cursor")))
    }

    /// Stores (or advances) a user's cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn put(&self, user_id: &str, cursor: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO sync_cursors (user_id, cursor, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id)
        .bind(cursor)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Forgets a user's cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear(&self, user_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sync_cursors WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cursors_are_stored_per_user() {
        let store = CursorStore::in_memory().await.unwrap();

        assert_eq!(store.get("u1").await.unwrap(), None);

        store.put("u1", "100").await.unwrap();
        store.put("u2", "200").await.unwrap();

        assert_eq!(store.get("u1").await.unwrap(), Some("100".to_string()));
        assert_eq!(store.get("u2").await.unwrap(), Some("200".to_string()));
    }

    #[tokio::test]
    async fn put_overwrites_the_previous_cursor() {
        let store = CursorStore::in_memory().await.unwrap();
        store.put("u1", "100").await.unwrap();
        store.put("u1", "150").await.unwrap();

        assert_eq!(store.get("u1").await.unwrap(), Some("150".to_string()));
    }

    #[tokio::test]
    async fn clear_forgets_one_user_only() {
        let store = CursorStore::in_memory().await.unwrap();
        store.put("u1", "100").await.unwrap();
        store.put("u2", "200").await.unwrap();

        store.clear("u1").await.unwrap();

        assert_eq!(store.get("u1").await.unwrap(), None);
        assert_eq!(store.get("u2").await.unwrap(), Some("200".to_string()));
    }
}
