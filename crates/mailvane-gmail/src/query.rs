//! Gmail search-query construction.
//!
//! Category browsing and free-text search both go through the `q`
//! parameter of `messages.list`. Spam and trash are kept out of results
//! unless the caller explicitly asks for them.

/// Query for the inbox view.
pub const INBOX: &str = "in:inbox -in:spam -in:trash";

/// Query for the starred view. Trashed messages keep their star, so
/// trash is excluded explicitly.
pub const STARRED: &str = "is:starred -in:trash";

/// Query for the spam view.
pub const SPAM: &str = "in:spam";

/// Query for the trash view.
pub const TRASH: &str = "in:trash";

/// Builds the query for a free-text search.
///
/// Spam and trash are excluded by default; a query that itself scopes
/// into `in:spam` or `in:trash` is passed through untouched.
#[must_use]
pub fn search(user_query: &str) -> String {
    let trimmed = user_query.trim();
    if trimmed.contains("in:spam") || trimmed.contains("in:trash") {
        trimmed.to_string()
    } else {
        format!("{trimmed} -in:spam -in:trash")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_excludes_spam_and_trash_by_default() {
        assert_eq!(search("invoice 2024"), "invoice 2024 -in:spam -in:trash");
        assert_eq!(search("  padded  "), "padded -in:spam -in:trash");
    }

    #[test]
    fn search_passes_explicit_spam_or_trash_through() {
        assert_eq!(search("in:spam unsubscribe"), "in:spam unsubscribe");
        assert_eq!(search("receipt in:trash"), "receipt in:trash");
    }
}
