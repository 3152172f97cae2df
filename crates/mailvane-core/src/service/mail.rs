//! Mail service for Gmail REST operations.
//!
//! Converts the wire types of `mailvane-gmail` into domain models and
//! exposes the operations the session needs: page fetches, label
//! mutations, history deltas, and watch management.

use chrono::{DateTime, Utc};
use mailvane_gmail::{GmailClient, MessageMetadata, WatchRequest, query};
use tracing::warn;

use crate::model::{Category, Email, ListPage, labels};
use crate::updates::WatchProvider;

/// Default page size for list fetches.
const DEFAULT_PAGE_SIZE: u32 = 30;

/// How many ids are hydrated per concurrent batch.
const HYDRATE_BATCH_SIZE: usize = 50;

/// Cap on detail fetches for one history delta.
const HISTORY_DETAIL_LIMIT: usize = 10;

/// Errors that can occur during mail operations.
#[derive(Debug, thiserror::Error)]
pub enum MailServiceError {
    /// The access token was rejected; the user must sign in again.
    #[error("authentication expired, sign in again")]
    AuthExpired,

    /// Any other provider failure.
    #[error("provider request failed: {0}")]
    Provider(String),
}

impl From<mailvane_gmail::Error> for MailServiceError {
    fn from(err: mailvane_gmail::Error) -> Self {
        match err {
            mailvane_gmail::Error::AuthExpired => Self::AuthExpired,
            other => Self::Provider(other.to_string()),
        }
    }
}

/// What a page fetch is for: a category view or a free-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    /// One of the persistent category views.
    Category(Category),
    /// A free-text search.
    Search(String),
}

impl FetchTarget {
    /// The provider query string for this target.
    #[must_use]
    pub fn query(&self) -> String {
        match self {
            Self::Category(category) => category_query(*category).to_string(),
            Self::Search(text) => query::search(text),
        }
    }
}

const fn category_query(category: Category) -> &'static str {
    match category {
        Category::Inbox => query::INBOX,
        Category::Starred => query::STARRED,
        Category::Spam => query::SPAM,
        Category::Trash => query::TRASH,
        // Search browsing always arrives via FetchTarget::Search; the
        // ephemeral view itself has no browse query.
        Category::Search => query::INBOX,
    }
}

/// Messages added since a previously observed cursor.
#[derive(Debug, Clone, Default)]
pub struct HistoryDelta {
    /// The change-stream cursor as of this delta.
    pub cursor: String,
    /// Newly added messages, in the provider's reported order.
    pub messages: Vec<Email>,
}

/// An active push subscription as the provider reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSubscription {
    /// Change-stream cursor at registration time.
    pub cursor: String,
    /// When the provider will stop delivering notifications.
    pub expires_at: DateTime<Utc>,
}

/// High-level mail operations for one authenticated mailbox.
///
/// Cloning is cheap; clones share the underlying HTTP client.
#[derive(Debug, Clone)]
pub struct MailService {
    client: GmailClient,
    page_size: u32,
}

impl MailService {
    /// Wraps a provider client.
    #[must_use]
    pub const fn new(client: GmailClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides the list page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Fetches one page of a category or search.
    ///
    /// First pages also carry the mailbox's current change-stream
    /// cursor when the provider reports one; failure to obtain it is
    /// not a page failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the list or any required detail fetch fails,
    /// or the token has expired.
    pub async fn fetch_page(
        &self,
        target: &FetchTarget,
        cursor: Option<&str>,
    ) -> Result<ListPage, MailServiceError> {
        let list = self
            .client
            .list_messages(&target.query(), self.page_size, cursor)
            .await?;

        if list.messages.is_empty() {
            return Ok(ListPage::default());
        }

        let ids: Vec<String> = list.messages.iter().map(|m| m.id.clone()).collect();
        let messages = self.hydrate(ids).await?;

        let sync_cursor = if cursor.is_none() {
            match self.client.profile().await {
                Ok(profile) => Some(profile.history_id),
                Err(err) => {
                    warn!(%err, "failed to fetch profile for the sync cursor");
                    None
                }
            }
        } else {
            None
        };

        Ok(ListPage {
            messages,
            next_cursor: list.next_page_token,
            result_size_estimate: list.result_size_estimate,
            sync_cursor,
        })
    }

    /// Fetches metadata for a set of ids, preserving input order.
    ///
    /// Individual fetch failures drop the message; an expired token
    /// aborts the whole batch.
    async fn hydrate(&self, ids: Vec<String>) -> Result<Vec<Email>, MailServiceError> {
        let mut emails = Vec::with_capacity(ids.len());

        for batch in ids.chunks(HYDRATE_BATCH_SIZE) {
            let mut handles = Vec::with_capacity(batch.len());
            for id in batch {
                let client = self.client.clone();
                let id = id.clone();
                handles.push(tokio::spawn(async move {
                    client.get_message_metadata(&id).await
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok(Ok(metadata)) => emails.push(email_from_metadata(&metadata)),
                    Ok(Err(mailvane_gmail::Error::AuthExpired)) => {
                        return Err(MailServiceError::AuthExpired);
                    }
                    Ok(Err(err)) => warn!(%err, "dropping message that failed to hydrate"),
                    Err(err) => warn!(%err, "hydration task failed"),
                }
            }
        }

        Ok(emails)
    }

    /// Fetches the inbox-scoped delta since `start_cursor`.
    ///
    /// Only additions that carry the inbox label are surfaced, and at
    /// most [`HISTORY_DETAIL_LIMIT`] of them are hydrated.
    ///
    /// # Errors
    ///
    /// Returns an error if the history fetch fails (including a cursor
    /// too old for the provider to diff against) or the token has
    /// expired.
    pub async fn fetch_history(&self, start_cursor: &str) -> Result<HistoryDelta, MailServiceError> {
        let list = self.client.history_since(start_cursor, labels::INBOX).await?;

        let mut ids: Vec<String> = Vec::new();
        for item in &list.history {
            for added in &item.messages_added {
                if added.message.label_ids.iter().any(|l| l == labels::INBOX) {
                    ids.push(added.message.id.clone());
                }
            }
        }
        ids.truncate(HISTORY_DETAIL_LIMIT);

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            match self.client.get_message_metadata(&id).await {
                Ok(metadata) => messages.push(email_from_metadata(&metadata)),
                Err(mailvane_gmail::Error::AuthExpired) => {
                    return Err(MailServiceError::AuthExpired);
                }
                Err(err) => warn!(%id, %err, "dropping delta message that failed to hydrate"),
            }
        }

        Ok(HistoryDelta {
            cursor: list.history_id,
            messages,
        })
    }

    /// Stars or unstars a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation fails or the token has expired.
    pub async fn set_starred(&self, id: &str, starred: bool) -> Result<(), MailServiceError> {
        if starred {
            self.client.modify_labels(id, &[labels::STARRED], &[]).await?;
        } else {
            self.client.modify_labels(id, &[], &[labels::STARRED]).await?;
        }
        Ok(())
    }

    /// Moves a message into or out of spam.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation fails or the token has expired.
    pub async fn set_spam(&self, id: &str, spam: bool) -> Result<(), MailServiceError> {
        if spam {
            self.client
                .modify_labels(id, &[labels::SPAM], &[labels::INBOX])
                .await?;
        } else {
            self.client
                .modify_labels(id, &[labels::INBOX], &[labels::SPAM])
                .await?;
        }
        Ok(())
    }

    /// Moves a message into or out of the trash.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation fails or the token has expired.
    pub async fn set_trashed(&self, id: &str, trashed: bool) -> Result<(), MailServiceError> {
        if trashed {
            self.client.trash_message(id).await?;
        } else {
            self.client.untrash_message(id).await?;
        }
        Ok(())
    }

    /// Clears a message's unread state.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation fails or the token has expired.
    pub async fn mark_read(&self, id: &str) -> Result<(), MailServiceError> {
        self.client.modify_labels(id, &[], &[labels::UNREAD]).await?;
        Ok(())
    }
}

impl WatchProvider for MailService {
    async fn setup_watch(&self, topic: &str) -> Result<WatchSubscription, MailServiceError> {
        let response = self.client.watch(&WatchRequest::inbox(topic)).await?;

        let expiry_ms: i64 = response.expiration.parse().map_err(|_| {
            MailServiceError::Provider(format!(
                "unparseable watch expiration: {}",
                response.expiration
            ))
        })?;
        let expires_at = DateTime::from_timestamp_millis(expiry_ms).ok_or_else(|| {
            MailServiceError::Provider(format!("watch expiration out of range: {expiry_ms}"))
        })?;

        Ok(WatchSubscription {
            cursor: response.history_id,
            expires_at,
        })
    }

    async fn stop_watch(&self) -> Result<(), MailServiceError> {
        self.client.stop_watch().await?;
        Ok(())
    }
}

/// Builds a domain message from provider metadata, denormalizing the
/// unread/starred flags from the label set.
fn email_from_metadata(metadata: &MessageMetadata) -> Email {
    let labels: std::collections::BTreeSet<String> =
        metadata.label_ids.iter().cloned().collect();
    let internal_date = metadata.internal_date.parse().unwrap_or(0);

    Email {
        id: metadata.id.clone(),
        thread_id: metadata.thread_id.clone(),
        subject: metadata
            .header("Subject")
            .unwrap_or("No Subject")
            .to_string(),
        from: metadata
            .header("From")
            .unwrap_or("Unknown Sender")
            .to_string(),
        date: metadata
            .header("Date")
            .unwrap_or(&metadata.internal_date)
            .to_string(),
        snippet: metadata.snippet.clone(),
        is_unread: labels.contains(labels::UNREAD),
        is_starred: labels.contains(labels::STARRED),
        labels,
        internal_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_target_queries() {
        assert_eq!(
            FetchTarget::Category(Category::Inbox).query(),
            "in:inbox -in:spam -in:trash"
        );
        assert_eq!(
            FetchTarget::Category(Category::Starred).query(),
            "is:starred -in:trash"
        );
        assert_eq!(FetchTarget::Category(Category::Spam).query(), "in:spam");
        assert_eq!(FetchTarget::Category(Category::Trash).query(), "in:trash");
        assert_eq!(
            FetchTarget::Search("report q3".to_string()).query(),
            "report q3 -in:spam -in:trash"
        );
    }

    #[test]
    fn metadata_conversion_denormalizes_flags() {
        let metadata: MessageMetadata = serde_json::from_str(
            r#"{
                "id": "m1",
                "threadId": "t1",
                "snippet": "hi",
                "labelIds": ["INBOX", "UNREAD", "STARRED"],
                "internalDate": "1700000000000",
                "payload": {"headers": [
                    {"name": "Subject", "value": "Hello"},
                    {"name": "From", "value": "Ann <ann@example.com>"},
                    {"name": "Date", "value": "Mon, 2 Jun 2025 10:00:00 +0000"}
                ]}
            }"#,
        )
        .unwrap_or_else(|_| unreachable!("fixture is valid"));

        let email = email_from_metadata(&metadata);
        assert_eq!(email.subject, "Hello");
        assert!(email.is_unread);
        assert!(email.is_starred);
        assert!(email.in_inbox());
        assert_eq!(email.internal_date, 1_700_000_000_000);
    }

    #[test]
    fn metadata_conversion_defaults_missing_headers() {
        let metadata: MessageMetadata = serde_json::from_str(
            r#"{"id": "m1", "threadId": "t1", "internalDate": "123"}"#,
        )
        .unwrap_or_else(|_| unreachable!("fixture is valid"));

        let email = email_from_metadata(&metadata);
        assert_eq!(email.subject, "No Subject");
        assert_eq!(email.from, "Unknown Sender");
        assert_eq!(email.date, "123");
        assert!(!email.is_unread);
    }
}
