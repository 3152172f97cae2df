//! Durable record of the push subscription.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;

/// The locally persisted view of the provider-side push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    /// Whether the subscription is believed to be live.
    pub active: bool,
    /// When the provider stops delivering notifications.
    pub expires_at: DateTime<Utc>,
    /// Change-stream cursor reported at registration time.
    pub cursor: String,
    /// Topic the subscription publishes to.
    pub topic: String,
}

impl PushSubscription {
    /// Whether the subscription is live at `now`.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }
}

/// Repository for the single push-subscription record.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct SubscriptionStore {
    pool: SqlitePool,
}

impl SubscriptionStore {
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
            CREATE TABLE IF NOT EXISTS push_subscription (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                active INTEGER NOT NULL,
                expires_at TEXT NOT NULL,
                cursor TEXT NOT NULL,
                topic TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persists the subscription record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, subscription: &PushSubscription) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO push_subscription (id, active, expires_at, cursor, topic)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                active = excluded.active,
                expires_at = excluded.expires_at,
                cursor = excluded.cursor,
                topic = excluded.topic
            ",
        )
        .bind(subscription.active)
        .bind(subscription.expires_at.to_rfc3339())
        .bind(&subscription.cursor)
        .bind(&subscription.topic)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads the stored record, if any. A record whose expiry no longer
    /// parses is deleted and reads as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load(&self) -> Result<Option<PushSubscription>> {
        let row = sqlx::query(
            "SELECT active, expires_at, cursor, topic FROM push_subscription WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at_text: String = row.get("expires_at");
        let Ok(expires_at) = DateTime::parse_from_rfc3339(&expires_at_text) else {
            self.clear().await?;
            return Ok(None);
        };

        Ok(Some(PushSubscription {
            active: row.get("active"),
            expires_at: expires_at.with_timezone(&Utc),
            cursor: row.get("cursor"),
            topic: row.get("topic"),
        }))
    }

    /// Forgets the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM push_subscription WHERE id = 1")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
