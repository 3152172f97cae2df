//! Cache entries and tier selection.

use serde::{Deserialize, Serialize};

use crate::model::ListPage;

/// Storage tier for a cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// In-process map only.
    Memory,
    /// In-process map plus the durable table (survives restarts).
    Durable,
    /// In-process map plus the session table (wiped on reopen).
    Session,
}

/// A cached list page with its expiry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached page.
    pub payload: ListPage,
    /// When the entry was written, epoch millis.
    pub timestamp_ms: i64,
    /// Time to live in millis.
    pub ttl_ms: i64,
}

impl CacheEntry {
    /// Creates an entry stamped at `timestamp_ms`.
    #[must_use]
    pub const fn new(payload: ListPage, timestamp_ms: i64, ttl_ms: i64) -> Self {
        Self {
            payload,
            timestamp_ms,
            ttl_ms,
        }
    }

    /// Whether the entry has outlived its TTL at `now_ms`.
    #[must_use]
    pub const fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms - self.timestamp_ms > self.ttl_ms
    }
}
