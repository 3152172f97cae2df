//! Domain models for the webmail engine.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known provider label tokens.
pub mod labels {
    /// Membership label for the inbox view.
    pub const INBOX: &str = "INBOX";
    /// Label backing the starred flag.
    pub const STARRED: &str = "STARRED";
    /// Label backing the unread flag.
    pub const UNREAD: &str = "UNREAD";
    /// Membership label for the spam view.
    pub const SPAM: &str = "SPAM";
    /// Membership label for the trash view.
    pub const TRASH: &str = "TRASH";
}

/// A mailbox view.
///
/// The four persistent categories are cacheable; `Search` holds
/// ephemeral results and is never written to any cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// The inbox view.
    Inbox,
    /// Starred messages.
    Starred,
    /// The spam folder.
    Spam,
    /// The trash folder.
    Trash,
    /// Ephemeral search results.
    Search,
}

impl Category {
    /// Every category, including the ephemeral search view.
    pub const ALL: [Self; 5] = [
        Self::Inbox,
        Self::Starred,
        Self::Spam,
        Self::Trash,
        Self::Search,
    ];

    /// The four persistent, cacheable categories.
    pub const PERSISTENT: [Self; 4] = [Self::Inbox, Self::Starred, Self::Spam, Self::Trash];

    /// Stable name used in cache keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Starred => "starred",
            Self::Spam => "spam",
            Self::Trash => "trash",
            Self::Search => "search",
        }
    }

    /// Whether list pages for this category may be cached.
    #[must_use]
    pub const fn is_cacheable(self) -> bool {
        !matches!(self, Self::Search)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message as rendered in a list view.
///
/// `is_unread` and `is_starred` are denormalized from the label set.
/// The pair must never diverge from `labels`; all flag changes go
/// through [`Email::with_starred`] and [`Email::with_unread`], which
/// update both sides in one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Opaque, stable message id.
    pub id: String,
    /// Thread the message belongs to.
    pub thread_id: String,
    /// Subject line.
    pub subject: String,
    /// Sender, as formatted by the provider.
    pub from: String,
    /// Display date.
    pub date: String,
    /// Preview text.
    pub snippet: String,
    /// Provider label tokens (unordered, unique).
    pub labels: BTreeSet<String>,
    /// Whether the message is unread. Mirrors `UNREAD` in `labels`.
    pub is_unread: bool,
    /// Whether the message is starred. Mirrors `STARRED` in `labels`.
    pub is_starred: bool,
    /// Numeric ordering key (provider-internal epoch millis).
    pub internal_date: i64,
}

impl Email {
    /// Copy-on-write star toggle: sets the flag and the `STARRED` label
    /// together. Idempotent.
    #[must_use]
    pub fn with_starred(mut self, starred: bool) -> Self {
        if starred {
            self.labels.insert(labels::STARRED.to_string());
        } else {
            self.labels.remove(labels::STARRED);
        }
        self.is_starred = starred;
        self
    }

    /// Copy-on-write unread toggle: sets the flag and the `UNREAD`
    /// label together. Idempotent.
    #[must_use]
    pub fn with_unread(mut self, unread: bool) -> Self {
        if unread {
            self.labels.insert(labels::UNREAD.to_string());
        } else {
            self.labels.remove(labels::UNREAD);
        }
        self.is_unread = unread;
        self
    }

    /// Whether the message carries the inbox membership label.
    #[must_use]
    pub fn in_inbox(&self) -> bool {
        self.labels.contains(labels::INBOX)
    }
}

/// One page of a category or search fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    /// Messages in server-defined order.
    pub messages: Vec<Email>,
    /// Cursor for the next page; `None` means no further pages.
    pub next_cursor: Option<String>,
    /// Server-side estimate of the total result size.
    pub result_size_estimate: u32,
    /// Change-stream cursor observed alongside this page, when the
    /// provider reported one (first pages only).
    pub sync_cursor: Option<String>,
}
