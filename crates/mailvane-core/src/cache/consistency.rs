//! Cross-category cache consistency for star toggles.
//!
//! Starring moves a message between the cached inbox and starred lists
//! without a refetch. The whole pass is best-effort by contract: each
//! step only touches a category that already has a cached first page,
//! absent entries are left absent, and nothing here can fail the
//! user-facing star action — the server response is the source of
//! truth, these lists are just kept plausible until the next fetch.

use tracing::debug;

use super::list::ListCache;
use crate::model::{Category, Email};

/// Rewrites the cached inbox and starred lists after a star change.
///
/// On starring, the message leaves the cached inbox list and lands at
/// the front of the cached starred list (or is updated in place if
/// already there). On unstarring, it leaves the starred list and is
/// prepended back to the inbox list only when it still carries the
/// inbox membership label; a starred-only message simply disappears
/// from both cached views.
pub async fn apply_star_change(
    cache: &mut ListCache,
    email: &Email,
    starred: bool,
    user: Option<&str>,
) {
    if starred {
        remove_from_cached(cache, Category::Inbox, &email.id, user).await;
        upsert_starred_front(cache, email, user).await;
    } else {
        remove_from_cached(cache, Category::Starred, &email.id, user).await;
        if email.in_inbox() {
            prepend_to_cached(cache, Category::Inbox, email.clone().with_starred(false), user)
                .await;
        } else {
            debug!(id = %email.id, "unstarred message has no inbox label, not reinserting");
        }
    }
}

/// Drops a message id from a category's cached first page, if cached.
async fn remove_from_cached(cache: &mut ListCache, category: Category, id: &str, user: Option<&str>) {
    let Some(mut page) = cache.cached_list(category, None, user).await else {
        return;
    };
    page.messages.retain(|m| m.id != id);
    cache.cache_list(category, &page, None, user).await;
}

/// Updates the starred copy in place, or inserts it at the front so
/// newly starred messages read most-recent-first.
async fn upsert_starred_front(cache: &mut ListCache, email: &Email, user: Option<&str>) {
    let Some(mut page) = cache.cached_list(Category::Starred, None, user).await else {
        return;
    };
    let updated = email.clone().with_starred(true);
    if let Some(existing) = page.messages.iter_mut().find(|m| m.id == email.id) {
        *existing = updated;
    } else {
        page.messages.insert(0, updated);
    }
    cache.cache_list(Category::Starred, &page, None, user).await;
}

/// Prepends a message to a category's cached first page, replacing any
/// stale copy with the same id.
async fn prepend_to_cached(
    cache: &mut ListCache,
    category: Category,
    email: Email,
    user: Option<&str>,
) {
    let Some(mut page) = cache.cached_list(category, None, user).await else {
        return;
    };
    page.messages.retain(|m| m.id != email.id);
    page.messages.insert(0, email);
    cache.cache_list(category, &page, None, user).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::clock::Clock;
    use crate::model::tests::email as make_email;
    use crate::model::{ListPage, labels};

    fn cache() -> ListCache {
        let (clock, _) = Clock::manual(0);
        ListCache::new(CacheManager::new(clock))
    }

    fn page_of(emails: Vec<Email>) -> ListPage {
        ListPage {
            messages: emails,
            ..ListPage::default()
        }
    }

    #[tokio::test]
    async fn starring_moves_message_from_inbox_to_front_of_starred() {
        let mut cache = cache();
        let target = make_email("e1", &["INBOX"]);
        cache
            .cache_list(
                Category::Inbox,
                &page_of(vec![target.clone(), make_email("other", &["INBOX"])]),
                None,
                Some("u1"),
            )
            .await;
        cache
            .cache_list(
                Category::Starred,
                &page_of(vec![make_email("s0", &["STARRED"])]),
                None,
                Some("u1"),
            )
            .await;

        apply_star_change(&mut cache, &target, true, Some("u1")).await;

        let inbox = cache.cached_list(Category::Inbox, None, Some("u1")).await.unwrap();
        assert!(inbox.messages.iter().all(|m| m.id != "e1"));
        assert_eq!(inbox.messages.len(), 1);

        let starred = cache.cached_list(Category::Starred, None, Some("u1")).await.unwrap();
        assert_eq!(starred.messages[0].id, "e1");
        assert!(starred.messages[0].is_starred);
        assert!(starred.messages[0].labels.contains(labels::STARRED));
    }

    #[tokio::test]
    async fn starring_updates_in_place_when_already_listed() {
        let mut cache = cache();
        let target = make_email("e1", &["INBOX"]);
        cache
            .cache_list(
                Category::Starred,
                &page_of(vec![make_email("s0", &["STARRED"]), make_email("e1", &["INBOX"])]),
                None,
                Some("u1"),
            )
            .await;

        apply_star_change(&mut cache, &target, true, Some("u1")).await;

        let starred = cache.cached_list(Category::Starred, None, Some("u1")).await.unwrap();
        assert_eq!(starred.messages.len(), 2);
        // Position is preserved; only the copy is refreshed.
        assert_eq!(starred.messages[1].id, "e1");
        assert!(starred.messages[1].is_starred);
    }

    #[tokio::test]
    async fn unstarring_prepends_to_inbox_when_inbox_labeled() {
        let mut cache = cache();
        let target = make_email("e2", &["INBOX", "STARRED"]);
        cache
            .cache_list(Category::Inbox, &page_of(vec![make_email("i0", &["INBOX"])]), None, Some("u2"))
            .await;
        cache
            .cache_list(
                Category::Starred,
                &page_of(vec![target.clone(), make_email("s0", &["STARRED"])]),
                None,
                Some("u2"),
            )
            .await;

        apply_star_change(&mut cache, &target, false, Some("u2")).await;

        let starred = cache.cached_list(Category::Starred, None, Some("u2")).await.unwrap();
        assert!(starred.messages.iter().all(|m| m.id != "e2"));

        let inbox = cache.cached_list(Category::Inbox, None, Some("u2")).await.unwrap();
        assert_eq!(inbox.messages[0].id, "e2");
        assert!(!inbox.messages[0].is_starred);
        assert!(!inbox.messages[0].labels.contains(labels::STARRED));
    }

    #[tokio::test]
    async fn unstarring_without_inbox_label_drops_from_both_views() {
        let mut cache = cache();
        let target = make_email("e3", &["STARRED"]);
        cache
            .cache_list(Category::Inbox, &page_of(vec![make_email("i1", &["INBOX"])]), None, Some("u3"))
            .await;
        cache
            .cache_list(Category::Starred, &page_of(vec![target.clone()]), None, Some("u3"))
            .await;

        apply_star_change(&mut cache, &target, false, Some("u3")).await;

        let starred = cache.cached_list(Category::Starred, None, Some("u3")).await.unwrap();
        assert!(starred.messages.iter().all(|m| m.id != "e3"));

        let inbox = cache.cached_list(Category::Inbox, None, Some("u3")).await.unwrap();
        assert!(inbox.messages.iter().all(|m| m.id != "e3"));
        assert_eq!(inbox.messages.len(), 1);
    }

    #[tokio::test]
    async fn absent_cache_entries_are_left_absent() {
        let mut cache = cache();
        let target = make_email("e4", &["INBOX"]);

        apply_star_change(&mut cache, &target, true, Some("u4")).await;

        assert!(cache.cached_list(Category::Inbox, None, Some("u4")).await.is_none());
        assert!(cache.cached_list(Category::Starred, None, Some("u4")).await.is_none());
    }
}
