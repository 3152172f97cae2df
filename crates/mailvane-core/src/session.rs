//! The session orchestrator.
//!
//! One `MailSession` owns the category state, the list cache, the
//! history sync engine, and the service handle for a single signed-in
//! user. All mutation runs here, single-threaded: user intents call the
//! provider first and apply local transitions only after the server
//! confirmed, while background signals from the coordinator funnel in
//! through [`MailSession::handle_signal`] and are contained — logged,
//! never surfaced.

use tracing::{debug, warn};

use crate::Result;
use crate::cache::{ListCache, apply_star_change};
use crate::model::{Category, Email};
use crate::service::{FetchTarget, MailService};
use crate::state::{CategoryStore, EmailUpdate, ListAction};
use crate::sync::HistorySync;
use crate::updates::SyncSignal;

/// Stateful facade over one user's mailbox views.
#[derive(Debug)]
pub struct MailSession {
    user_id: String,
    service: MailService,
    store: CategoryStore,
    cache: ListCache,
    history: HistorySync,
}

impl MailSession {
    /// Wires a session together.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        service: MailService,
        cache: ListCache,
        history: HistorySync,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            service,
            store: CategoryStore::new(),
            cache,
            history,
        }
    }

    /// The rendered state, for display.
    #[must_use]
    pub const fn store(&self) -> &CategoryStore {
        &self.store
    }

    /// The signed-in user this session belongs to.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Loads a page of a category into the store, consulting the cache
    /// unless `force` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the previous list state is
    /// left untouched in that case.
    pub async fn load_category(
        &mut self,
        category: Category,
        cursor: Option<&str>,
        append: bool,
        force: bool,
    ) -> Result<()> {
        if category == Category::Search {
            warn!("search loads go through MailSession::search");
            return Ok(());
        }

        self.store.set_loading(category, true);
        let outcome = self.load_category_inner(category, cursor, append, force).await;
        self.store.set_loading(category, false);
        outcome
    }

    async fn load_category_inner(
        &mut self,
        category: Category,
        cursor: Option<&str>,
        append: bool,
        force: bool,
    ) -> Result<()> {
        let user = Some(self.user_id.clone());
        let user = user.as_deref();

        if !force
            && let Some(page) = self.cache.cached_list(category, cursor, user).await
        {
            debug!(%category, cursor, "serving category page from cache");
            self.apply_page(category, page, append);
            return Ok(());
        }

        let page = self
            .service
            .fetch_page(&FetchTarget::Category(category), cursor)
            .await?;

        self.cache.cache_list(category, &page, cursor, user).await;

        if category == Category::Inbox
            && cursor.is_none()
            && let Some(sync_cursor) = &page.sync_cursor
            && let Err(err) = self.history.store_cursor(sync_cursor).await
        {
            warn!(%err, "failed to persist the sync cursor");
        }

        self.apply_page(category, page, append);
        Ok(())
    }

    /// Loads the next page of a category, if one is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn load_more(&mut self, category: Category) -> Result<()> {
        let Some(cursor) = self.store.next_cursor(category).map(ToString::to_string) else {
            return Ok(());
        };
        self.load_category(category, Some(&cursor), true, false).await
    }

    /// Cache-busting reload of a category's first page.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn refresh(&mut self, category: Category) -> Result<()> {
        let user = self.user_id.clone();
        self.cache.invalidate_category(category, Some(&user)).await;
        self.load_category(category, None, false, true).await
    }

    /// Runs a free-text search into the ephemeral search view.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn search(&mut self, text: &str) -> Result<()> {
        self.store.set_loading(Category::Search, true);
        let outcome = self
            .service
            .fetch_page(&FetchTarget::Search(text.to_string()), None)
            .await;
        self.store.set_loading(Category::Search, false);

        let page = outcome?;
        self.store.set_cursor(Category::Search, page.next_cursor.clone());
        self.store.dispatch(ListAction::Set {
            category: Category::Search,
            emails: page.messages,
        });
        Ok(())
    }

    /// Leaves search mode, dropping the ephemeral results.
    pub fn clear_search(&mut self) {
        self.store.dispatch(ListAction::Clear {
            category: Category::Search,
        });
        self.store.set_cursor(Category::Search, None);
    }

    /// Stars or unstars a message. The server confirms first; only then
    /// are the rendered lists and the cached lists patched.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation fails; local state is untouched
    /// in that case.
    pub async fn set_starred(&mut self, id: &str, starred: bool) -> Result<()> {
        self.service.set_starred(id, starred).await?;

        self.store.dispatch(ListAction::UpdateAll {
            id: id.to_string(),
            update: EmailUpdate::starred(starred),
        });

        if let Some(email) = self.find_email(id) {
            let user = self.user_id.clone();
            apply_star_change(&mut self.cache, &email, starred, Some(&user)).await;
        } else {
            debug!(id, "starred message not in any rendered list, caches left as-is");
        }
        Ok(())
    }

    /// Moves a message into or out of the trash, removing it from the
    /// category it was acted on from.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation fails; local state is untouched
    /// in that case.
    pub async fn set_trashed(
        &mut self,
        id: &str,
        trashed: bool,
        category: Category,
    ) -> Result<()> {
        self.service.set_trashed(id, trashed).await?;
        self.remove_and_invalidate(id, category, Category::Trash, trashed).await;
        Ok(())
    }

    /// Moves a message into or out of spam, removing it from the
    /// category it was acted on from.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation fails; local state is untouched
    /// in that case.
    pub async fn set_spam(&mut self, id: &str, spam: bool, category: Category) -> Result<()> {
        self.service.set_spam(id, spam).await?;
        self.remove_and_invalidate(id, category, Category::Spam, spam).await;
        Ok(())
    }

    /// Clears a message's unread state everywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation fails; local state is untouched
    /// in that case.
    pub async fn mark_read(&mut self, id: &str) -> Result<()> {
        self.service.mark_read(id).await?;
        self.store.dispatch(ListAction::MarkRead { id: id.to_string() });
        Ok(())
    }

    /// Routes a coordinator signal. Background failures are contained
    /// here: logged, never propagated.
    pub async fn handle_signal(&mut self, signal: SyncSignal) {
        match signal {
            SyncSignal::PollRefresh => {
                if let Err(err) = self.refresh(Category::Inbox).await {
                    warn!(%err, "poll refresh failed");
                }
            }
            SyncSignal::Remote { cursor, message_id } => {
                debug!(?cursor, ?message_id, "remote change observed");
                let outcome = self
                    .history
                    .observe_cursor(
                        cursor.as_deref(),
                        &self.service,
                        &mut self.store,
                        &mut self.cache,
                    )
                    .await;
                if let Err(err) = outcome {
                    warn!(%err, "history sync failed");
                }
            }
        }
    }

    /// First rendered copy of a message across all category lists.
    fn find_email(&self, id: &str) -> Option<Email> {
        Category::ALL
            .iter()
            .flat_map(|category| self.store.emails(*category))
            .find(|email| email.id == id)
            .cloned()
    }

    /// Shared tail of the move-style mutations: drop from the acting
    /// list and invalidate the category pair the move touched.
    async fn remove_and_invalidate(
        &mut self,
        id: &str,
        acted_from: Category,
        destination: Category,
        moved_in: bool,
    ) {
        self.store.dispatch(ListAction::Remove {
            category: acted_from,
            id: id.to_string(),
        });

        let user = self.user_id.clone();
        let user = Some(user.as_str());
        // Moving in dirties the destination; moving out dirties the
        // inbox the message returns to. The acting category is dirty
        // either way.
        self.cache.invalidate_category(acted_from, user).await;
        if moved_in {
            self.cache.invalidate_category(destination, user).await;
        } else {
            self.cache.invalidate_category(Category::Inbox, user).await;
        }
    }

    /// Applies a fetched page to the rendered state.
    fn apply_page(&mut self, category: Category, page: crate::model::ListPage, append: bool) {
        self.store.set_cursor(category, page.next_cursor.clone());
        let action = if append {
            ListAction::Append {
                category,
                emails: page.messages,
            }
        } else {
            ListAction::Set {
                category,
                emails: page.messages,
            }
        };
        self.store.dispatch(action);
    }
}
