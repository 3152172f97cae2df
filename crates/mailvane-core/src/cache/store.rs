//! Durable cache tier backed by `SQLite`.
//!
//! Two tables with the same shape back the two durable tiers: the
//! `list_cache` table survives restarts, the `session_cache` table is
//! wiped every time the store is opened. Payloads are stored as JSON;
//! a row that no longer parses is treated as a miss and deleted.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::entry::{CacheEntry, Tier};
use crate::Result;
use crate::model::ListPage;

/// Repository for durable cache entries.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    /// Opens (or creates) the store at the given database path.
    ///
    /// The session table is cleared as part of opening.
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

    /// Creates an in-memory store for testing.
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

    /// Initialize database schema and reset the session tier.
    async fn initialize(&self) -> Result<()> {
        for table in [Self::table(Tier::Durable), Self::table(Tier::Session)] {
            sqlx::query(&format!(
                r"
                CREATE TABLE IF NOT EXISTS {table} (
                    cache_key TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    timestamp_ms INTEGER NOT NULL,
                    ttl_ms INTEGER NOT NULL
                )
                "
            ))
            .execute(&self.pool)
            .await?;
        }

        // Session entries do not outlive the client instance.
        sqlx::query("DELETE FROM session_cache")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    const fn table(tier: Tier) -> &'static str {
        match tier {
            // Memory never reaches the store; map it to the durable
            // table so a stray call stays harmless.
            Tier::Durable | Tier::Memory => "list_cache",
            Tier::Session => "session_cache",
        }
    }

    /// Removes every entry that is expired at `now_ms` or no longer
    /// parses. Returns how many rows were purged.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn sweep(&self, now_ms: i64) -> Result<u64> {
        let mut purged = 0;
        for tier in [Tier::Durable, Tier::Session] {
            let table = Self::table(tier);
            let rows = sqlx::query(&format!(
                "SELECT cache_key, payload, timestamp_ms, ttl_ms FROM {table}"
            ))
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                let key: String = row.get("cache_key");
                let timestamp_ms: i64 = row.get("timestamp_ms");
                let ttl_ms: i64 = row.get("ttl_ms");
                let malformed =
                    serde_json::from_str::<ListPage>(&row.get::<String, _>("payload")).is_err();
                if malformed || now_ms - timestamp_ms > ttl_ms {
                    self.remove_row(tier, &key).await?;
                    purged += 1;
                }
            }
        }

        if purged > 0 {
            debug!(purged, "swept stale cache rows");
        }
        Ok(purged)
    }

    /// Writes an entry to a durable tier, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database query fails.
    pub async fn put(&self, tier: Tier, key: &str, entry: &CacheEntry) -> Result<()> {
        let table = Self::table(tier);
        let payload = serde_json::to_string(&entry.payload)?;
        sqlx::query(&format!(
            r"
            INSERT INTO {table} (cache_key, payload, timestamp_ms, ttl_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                timestamp_ms = excluded.timestamp_ms,
                ttl_ms = excluded.ttl_ms
            "
        ))
        .bind(key)
        .bind(payload)
        .bind(entry.timestamp_ms)
        .bind(entry.ttl_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reads an entry from a durable tier.
    ///
    /// An expired or malformed row reads as `None` and is deleted as a
    /// side effect.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn get(&self, tier: Tier, key: &str, now_ms: i64) -> Result<Option<CacheEntry>> {
        let table = Self::table(tier);
        let row = sqlx::query(&format!(
            "SELECT payload, timestamp_ms, ttl_ms FROM {table} WHERE cache_key = ?"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Ok(payload) = serde_json::from_str::<ListPage>(&row.get::<String, _>("payload"))
        else {
            self.remove_row(tier, key).await?;
            return Ok(None);
        };

        let entry = CacheEntry::new(payload, row.get("timestamp_ms"), row.get("ttl_ms"));
        if entry.is_expired_at(now_ms) {
            self.remove_row(tier, key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn remove_row(&self, tier: Tier, key: &str) -> Result<()> {
        let table = Self::table(tier);
        sqlx::query(&format!("DELETE FROM {table} WHERE cache_key = ?"))
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes a key from both durable tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn delete(&self, key: &str) -> Result<()> {
        for tier in [Tier::Durable, Tier::Session] {
            self.remove_row(tier, key).await?;
        }
        Ok(())
    }

    /// Removes every key starting with `prefix` from both tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let pattern = format!("{}%", like_escape(prefix));
        for tier in [Tier::Durable, Tier::Session] {
            let table = Self::table(tier);
            sqlx::query(&format!(
                r"DELETE FROM {table} WHERE cache_key LIKE ? ESCAPE '\'"
            ))
            .bind(&pattern)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Empties both durable tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn clear(&self) -> Result<()> {
        for tier in [Tier::Durable, Tier::Session] {
            let table = Self::table(tier);
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Number of rows currently held by a durable tier.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn len(&self, tier: Tier) -> Result<u64> {
        let table = Self::table(tier);
        let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("count");
        Ok(count.unsigned_abs())
    }

    /// Writes a raw row, bypassing serialization. Exists so tests can
    /// plant malformed payloads.
    #[cfg(test)]
    pub(crate) async fn raw_put(
        &self,
        tier: Tier,
        key: &str,
        payload: &str,
        timestamp_ms: i64,
        ttl_ms: i64,
    ) -> Result<()> {
        let table = Self::table(tier);
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {table} (cache_key, payload, timestamp_ms, ttl_ms) VALUES (?, ?, ?, ?)"
        ))
        .bind(key)
        .bind(payload)
        .bind(timestamp_ms)
        .bind(ttl_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Escapes `%`, `_`, and the escape character itself for a LIKE
/// pattern using `ESCAPE '\'`.
fn like_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
