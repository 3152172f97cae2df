//! Category-aware facade over the tiered cache.
//!
//! Owns key construction and the TTL policy: the inbox first page is
//! cached briefly so new mail surfaces quickly, everything else gets
//! the default TTL, and empty results are kept even shorter. Search
//! results are never cached.

use tracing::debug;

use super::entry::Tier;
use super::manager::{CacheManager, CacheOptions};
use crate::model::{Category, ListPage};

/// TTL for the inbox first page.
pub const INBOX_FIRST_PAGE_TTL_MS: i64 = 30 * 1_000;

/// TTL for every other category/page combination.
pub const DEFAULT_TTL_MS: i64 = 5 * 60 * 1_000;

/// TTL for a page that came back empty.
pub const EMPTY_PAGE_TTL_MS: i64 = 60 * 1_000;

/// User id substituted when none is known.
const ANONYMOUS: &str = "anonymous";

/// Cursor segment for the first page.
const FIRST_PAGE: &str = "first";

/// List cache keyed by (user, category, page cursor).
#[derive(Debug)]
pub struct ListCache {
    manager: CacheManager,
}

impl ListCache {
    /// Wraps a cache manager.
    #[must_use]
    pub const fn new(manager: CacheManager) -> Self {
        Self { manager }
    }

    /// Builds the cache key for a (user, category, cursor) triple.
    ///
    /// Stable and injective: equal inputs collide, any differing input
    /// produces a different key.
    #[must_use]
    pub fn cache_key(category: Category, cursor: Option<&str>, user: Option<&str>) -> String {
        format!(
            "{}:{}:{}",
            user.unwrap_or(ANONYMOUS),
            category.as_str(),
            cursor.unwrap_or(FIRST_PAGE)
        )
    }

    /// Caches a fetched page for a category.
    ///
    /// No-op for the search pseudo-category.
    pub async fn cache_list(
        &mut self,
        category: Category,
        payload: &ListPage,
        cursor: Option<&str>,
        user: Option<&str>,
    ) {
        if !category.is_cacheable() {
            debug!(%category, "skipping cache write for ephemeral category");
            return;
        }

        let key = Self::cache_key(category, cursor, user);
        let options = CacheOptions {
            ttl_ms: ttl_for(category, cursor, payload),
            tier: Tier::Durable,
        };
        self.manager.set(&key, payload.clone(), options).await;
    }

    /// Reads the cached page for a category, if one is live.
    pub async fn cached_list(
        &mut self,
        category: Category,
        cursor: Option<&str>,
        user: Option<&str>,
    ) -> Option<ListPage> {
        if !category.is_cacheable() {
            return None;
        }

        let key = Self::cache_key(category, cursor, user);
        self.manager.get(&key, Tier::Durable).await
    }

    /// Drops every cached page of a user's category, across cursors.
    ///
    /// Used when an out-of-band change notification arrives, so the
    /// next fetch bypasses the cache.
    pub async fn invalidate_category(&mut self, category: Category, user: Option<&str>) {
        let prefix = format!("{}:{}:", user.unwrap_or(ANONYMOUS), category.as_str());
        self.manager.delete_prefix(&prefix).await;
    }

    /// Empties the cache entirely.
    pub async fn clear(&mut self) {
        self.manager.clear().await;
    }
}

/// Picks the TTL for a page write. The inbox first page is short so new
/// mail shows up quickly; empty results are retried even sooner.
fn ttl_for(category: Category, cursor: Option<&str>, payload: &ListPage) -> i64 {
    if payload.messages.is_empty() {
        EMPTY_PAGE_TTL_MS
    } else if category == Category::Inbox && cursor.is_none() {
        INBOX_FIRST_PAGE_TTL_MS
    } else {
        DEFAULT_TTL_MS
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::model::tests::email;

    fn page(ids: &[&str]) -> ListPage {
        ListPage {
            messages: ids.iter().map(|id| email(id, &["INBOX"])).collect(),
            ..ListPage::default()
        }
    }

    fn memory_cache(clock: Clock) -> ListCache {
        ListCache::new(CacheManager::new(clock))
    }

    #[test]
    fn key_includes_user_category_and_cursor() {
        assert_eq!(
            ListCache::cache_key(Category::Inbox, None, Some("u1")),
            "u1:inbox:first"
        );
        assert_eq!(
            ListCache::cache_key(Category::Inbox, Some("t2"), Some("u2")),
            "u2:inbox:t2"
        );
        assert_eq!(
            ListCache::cache_key(Category::Starred, None, None),
            "anonymous:starred:first"
        );
    }

    #[test]
    fn keys_are_injective_over_inputs() {
        let a = ListCache::cache_key(Category::Inbox, None, Some("u1"));
        let b = ListCache::cache_key(Category::Inbox, None, Some("u2"));
        let c = ListCache::cache_key(Category::Starred, None, Some("u1"));
        let d = ListCache::cache_key(Category::Inbox, Some("p2"), Some("u1"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a, ListCache::cache_key(Category::Inbox, None, Some("u1")));
    }

    #[tokio::test]
    async fn inbox_first_page_expires_after_thirty_seconds() {
        let (clock, time) = Clock::manual(0);
        let mut cache = memory_cache(clock);
        let response = page(&["m1"]);

        cache.cache_list(Category::Inbox, &response, None, Some("uX")).await;

        time.advance(29_000);
        assert_eq!(
            cache.cached_list(Category::Inbox, None, Some("uX")).await,
            Some(response)
        );

        time.advance(2_000);
        assert_eq!(cache.cached_list(Category::Inbox, None, Some("uX")).await, None);
    }

    #[tokio::test]
    async fn other_pages_use_the_five_minute_ttl() {
        let (clock, time) = Clock::manual(0);
        let mut cache = memory_cache(clock);

        cache.cache_list(Category::Starred, &page(&["mA"]), None, Some("u1")).await;
        cache.cache_list(Category::Inbox, &page(&["mB"]), Some("page2"), Some("u1")).await;

        time.advance(4 * 60 * 1_000 + 59_000);
        assert!(cache.cached_list(Category::Starred, None, Some("u1")).await.is_some());
        assert!(
            cache
                .cached_list(Category::Inbox, Some("page2"), Some("u1"))
                .await
                .is_some()
        );

        time.advance(2_000);
        assert!(cache.cached_list(Category::Starred, None, Some("u1")).await.is_none());
        assert!(
            cache
                .cached_list(Category::Inbox, Some("page2"), Some("u1"))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn empty_pages_get_the_short_ttl() {
        let (clock, time) = Clock::manual(0);
        let mut cache = memory_cache(clock);

        cache.cache_list(Category::Starred, &page(&[]), None, Some("u1")).await;

        time.advance(59_000);
        assert!(cache.cached_list(Category::Starred, None, Some("u1")).await.is_some());
        time.advance(2_000);
        assert!(cache.cached_list(Category::Starred, None, Some("u1")).await.is_none());
    }

    #[tokio::test]
    async fn search_results_are_never_cached() {
        let (clock, _time) = Clock::manual(0);
        let mut cache = memory_cache(clock);

        cache.cache_list(Category::Search, &page(&["m1"]), None, Some("u1")).await;
        assert_eq!(cache.cached_list(Category::Search, None, Some("u1")).await, None);
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_user_and_category() {
        let (clock, _time) = Clock::manual(0);
        let mut cache = memory_cache(clock);

        cache.cache_list(Category::Inbox, &page(&["i1"]), None, Some("u1")).await;
        cache.cache_list(Category::Inbox, &page(&["i1b"]), Some("p2"), Some("u1")).await;
        cache.cache_list(Category::Starred, &page(&["s1"]), None, Some("u1")).await;
        cache.cache_list(Category::Inbox, &page(&["i2"]), None, Some("u2")).await;

        cache.invalidate_category(Category::Inbox, Some("u1")).await;

        assert!(cache.cached_list(Category::Inbox, None, Some("u1")).await.is_none());
        assert!(
            cache
                .cached_list(Category::Inbox, Some("p2"), Some("u1"))
                .await
                .is_none()
        );
        assert_eq!(
            cache.cached_list(Category::Starred, None, Some("u1")).await,
            Some(page(&["s1"]))
        );
        assert_eq!(
            cache.cached_list(Category::Inbox, None, Some("u2")).await,
            Some(page(&["i2"]))
        );
    }
}
