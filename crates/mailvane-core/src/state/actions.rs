//! Actions accepted by the category state store.

use crate::model::{Category, Email};

/// A partial message update applied through the reducer.
///
/// Flag changes route through the atomic [`Email`] constructors, so a
/// reducer step can never leave the denormalized flags and the label
/// set disagreeing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmailUpdate {
    /// New starred state, if it changes.
    pub starred: Option<bool>,
    /// New unread state, if it changes.
    pub unread: Option<bool>,
}

impl EmailUpdate {
    /// An update that only changes the starred state.
    #[must_use]
    pub const fn starred(value: bool) -> Self {
        Self {
            starred: Some(value),
            unread: None,
        }
    }

    /// An update that only changes the unread state.
    #[must_use]
    pub const fn unread(value: bool) -> Self {
        Self {
            starred: None,
            unread: Some(value),
        }
    }

    /// Produces the merged copy of a message.
    #[must_use]
    pub fn apply(&self, email: &Email) -> Email {
        let mut next = email.clone();
        if let Some(starred) = self.starred {
            next = next.with_starred(starred);
        }
        if let Some(unread) = self.unread {
            next = next.with_unread(unread);
        }
        next
    }
}

/// State transitions over the category lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListAction {
    /// Replace a category's sequence wholesale (fresh first-page loads
    /// and search results).
    Set {
        /// Category to replace.
        category: Category,
        /// The new sequence.
        emails: Vec<Email>,
    },
    /// Concatenate at the end (pagination).
    Append {
        /// Category to extend.
        category: Category,
        /// Messages to append.
        emails: Vec<Email>,
    },
    /// Insert at the front unless the id is already present. Racing
    /// prepend sources (live push vs. user refresh) make this guard
    /// load-bearing, not defensive.
    Prepend {
        /// Category to prepend into.
        category: Category,
        /// The message to insert.
        email: Email,
    },
    /// Merge an update into one category's copy of a message.
    Update {
        /// Category to touch.
        category: Category,
        /// Id of the message to update.
        id: String,
        /// Fields to merge.
        update: EmailUpdate,
    },
    /// Merge an update into every category's copy of a message.
    UpdateAll {
        /// Id of the message to update.
        id: String,
        /// Fields to merge.
        update: EmailUpdate,
    },
    /// Clear the unread flag and label across every category.
    MarkRead {
        /// Id of the message that was read.
        id: String,
    },
    /// Remove a message from one category's sequence only.
    Remove {
        /// Category to remove from.
        category: Category,
        /// Id of the message to drop.
        id: String,
    },
    /// Reset a category's sequence to empty.
    Clear {
        /// Category to reset.
        category: Category,
    },
}
