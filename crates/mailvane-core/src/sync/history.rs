//! History-based incremental sync.
//!
//! Entry point: a change-stream cursor was observed out-of-band. With a
//! stored prior cursor the engine fetches only the delta and prepends
//! the additions; without one (first run, cleared storage) it falls
//! back to a cache-busting full refetch of the inbox. Either way the
//! newest cursor ends up persisted so the next observation can diff.

use tracing::{debug, warn};

use super::cursor::CursorStore;
use crate::Result;
use crate::cache::ListCache;
use crate::model::Category;
use crate::service::{FetchTarget, MailService};
use crate::state::{CategoryStore, ListAction};

/// Drives delta sync for one user's inbox.
#[derive(Debug)]
pub struct HistorySync {
    cursors: CursorStore,
    user_id: String,
}

impl HistorySync {
    /// Creates the engine over a cursor repository.
    #[must_use]
    pub const fn new(cursors: CursorStore, user_id: String) -> Self {
        Self { cursors, user_id }
    }

    /// The cursor persisted for this user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn stored_cursor(&self) -> Result<Option<String>> {
        self.cursors.get(&self.user_id).await
    }

    /// Persists a newly observed cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn store_cursor(&self, cursor: &str) -> Result<()> {
        self.cursors.put(&self.user_id, cursor).await
    }

    /// Reacts to an observed cursor.
    ///
    /// With a prior cursor stored, fetches the delta, persists the new
    /// cursor (even when the delta is empty), and prepends the
    /// inbox-labeled additions oldest-first so the newest message ends
    /// up at the top. On a delta failure, or with no prior cursor,
    /// falls back to a full inbox refetch and then persists the
    /// observed cursor.
    ///
    /// # Errors
    ///
    /// Returns an error only when the fallback full refetch itself
    /// fails; callers in background paths log and carry on.
    pub async fn observe_cursor(
        &self,
        observed: Option<&str>,
        service: &MailService,
        store: &mut CategoryStore,
        cache: &mut ListCache,
    ) -> Result<()> {
        let Some(observed) = observed else {
            // The notification did not say where the stream is; all we
            // can do is reload.
            debug!("update without a cursor, reloading inbox");
            return self.full_refresh(service, store, cache).await;
        };

        let prior = self.stored_cursor().await?;
        let Some(prior) = prior else {
            debug!(observed, "no prior cursor stored, reloading inbox");
            self.full_refresh(service, store, cache).await?;
            self.store_cursor(observed).await?;
            return Ok(());
        };

        match service.fetch_history(&prior).await {
            Ok(delta) => {
                self.store_cursor(&delta.cursor).await?;
                let added = delta
                    .messages
                    .into_iter()
                    .filter(crate::model::Email::in_inbox);
                // Prepending walks oldest to newest so the newest
                // message lands at the front.
                for email in added.rev() {
                    store.dispatch(ListAction::Prepend {
                        category: Category::Inbox,
                        email,
                    });
                }
                Ok(())
            }
            Err(err) => {
                warn!(%err, %prior, "delta sync failed, falling back to full refetch");
                self.full_refresh(service, store, cache).await?;
                self.store_cursor(observed).await?;
                Ok(())
            }
        }
    }

    /// Cache-busting reload of the inbox first page.
    async fn full_refresh(
        &self,
        service: &MailService,
        store: &mut CategoryStore,
        cache: &mut ListCache,
    ) -> Result<()> {
        let user = Some(self.user_id.as_str());
        cache.invalidate_category(Category::Inbox, user).await;

        let page = service
            .fetch_page(&FetchTarget::Category(Category::Inbox), None)
            .await?;
        cache.cache_list(Category::Inbox, &page, None, user).await;

        store.set_cursor(Category::Inbox, page.next_cursor.clone());
        store.dispatch(ListAction::Set {
            category: Category::Inbox,
            emails: page.messages,
        });
        Ok(())
    }
}
