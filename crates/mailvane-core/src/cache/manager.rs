//! The tiered cache manager.
//!
//! Every write lands in the fast in-process tier; writes may
//! additionally target one of the durable tables. Reads check the fast
//! tier first and promote durable hits back into it. The fast tier is
//! bounded: once it holds more than [`MAX_MEMORY_ENTRIES`] entries the
//! oldest-inserted key is evicted. Eviction is strictly
//! insertion-ordered (a FIFO), not recency-aware — re-writing an
//! existing key keeps its original queue slot.
//!
//! Durable-tier failures never escape this type: the store's fallible
//! API is exercised underneath, the result is logged and discarded, and
//! the fast tier stays authoritative.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use super::entry::{CacheEntry, Tier};
use super::store::CacheStore;
use crate::clock::Clock;
use crate::model::ListPage;

/// Bound on the fast tier, in entries.
const MAX_MEMORY_ENTRIES: usize = 100;

/// Per-write cache parameters.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Time to live in millis.
    pub ttl_ms: i64,
    /// Tier the write should additionally reach.
    pub tier: Tier,
}

/// Two-tier cache for list pages.
///
/// Constructed explicitly and passed by handle to whoever needs it; its
/// lifetime is the session's, not the process image's.
#[derive(Debug)]
pub struct CacheManager {
    fast: HashMap<String, CacheEntry>,
    insertion_order: VecDeque<String>,
    store: Option<CacheStore>,
    clock: Clock,
}

impl CacheManager {
    /// A memory-only manager, for contexts with no durable storage.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            fast: HashMap::new(),
            insertion_order: VecDeque::new(),
            store: None,
            clock,
        }
    }

    /// A manager backed by a durable store. Stale and malformed durable
    /// rows are purged eagerly.
    pub async fn with_store(store: CacheStore, clock: Clock) -> Self {
        if let Err(err) = store.sweep(clock.now_ms()).await {
            warn!(%err, "initial cache sweep failed");
        }
        Self {
            fast: HashMap::new(),
            insertion_order: VecDeque::new(),
            store: Some(store),
            clock,
        }
    }

    /// Writes a page under `key`.
    ///
    /// The fast tier is written unconditionally. When `options.tier`
    /// names a durable tier and a store is available, that table is
    /// written as well; durable failures are swallowed.
    pub async fn set(&mut self, key: &str, payload: ListPage, options: CacheOptions) {
        let entry = CacheEntry::new(payload, self.clock.now_ms(), options.ttl_ms);

        if options.tier != Tier::Memory
            && let Some(store) = &self.store
            && let Err(err) = store.put(options.tier, key, &entry).await
        {
            warn!(key, %err, "durable cache write failed");
        }

        self.insert_fast(key, entry);
    }

    /// Reads the page under `key`, or `None` on a miss.
    ///
    /// The fast tier wins when it holds a live entry. Otherwise, and
    /// only when a durable tier was requested, the store is consulted;
    /// a live durable hit is promoted into the fast tier, an expired
    /// one is deleted.
    pub async fn get(&mut self, key: &str, tier: Tier) -> Option<ListPage> {
        let now_ms = self.clock.now_ms();

        if let Some(entry) = self.fast.get(key)
            && !entry.is_expired_at(now_ms)
        {
            return Some(entry.payload.clone());
        }

        if tier == Tier::Memory {
            return None;
        }

        let store = self.store.as_ref()?;
        match store.get(tier, key, now_ms).await {
            Ok(Some(entry)) => {
                let payload = entry.payload.clone();
                debug!(key, "promoting durable cache hit");
                self.insert_fast(key, entry);
                Some(payload)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(key, %err, "durable cache read failed");
                None
            }
        }
    }

    /// Removes `key` from every tier.
    pub async fn delete(&mut self, key: &str) {
        self.fast.remove(key);
        self.insertion_order.retain(|k| k != key);

        if let Some(store) = &self.store
            && let Err(err) = store.delete(key).await
        {
            warn!(key, %err, "durable cache delete failed");
        }
    }

    /// Removes every key starting with `prefix` from every tier.
    pub async fn delete_prefix(&mut self, prefix: &str) {
        self.fast.retain(|k, _| !k.starts_with(prefix));
        self.insertion_order.retain(|k| !k.starts_with(prefix));

        if let Some(store) = &self.store
            && let Err(err) = store.delete_prefix(prefix).await
        {
            warn!(prefix, %err, "durable cache prefix delete failed");
        }
    }

    /// Empties every tier.
    pub async fn clear(&mut self) {
        self.fast.clear();
        self.insertion_order.clear();

        if let Some(store) = &self.store
            && let Err(err) = store.clear().await
        {
            warn!(%err, "durable cache clear failed");
        }
    }

    /// Number of entries currently held by the fast tier.
    #[must_use]
    pub fn memory_len(&self) -> usize {
        self.fast.len()
    }

    /// Inserts into the fast tier, keeping the insertion-order queue in
    /// step and enforcing the FIFO bound.
    fn insert_fast(&mut self, key: &str, entry: CacheEntry) {
        if !self.fast.contains_key(key) {
            self.insertion_order.push_back(key.to_string());
        }
        self.fast.insert(key.to_string(), entry);

        while self.fast.len() > MAX_MEMORY_ENTRIES {
            let Some(oldest) = self.insertion_order.pop_front() else {
                break;
            };
            self.fast.remove(&oldest);
        }
    }
}
