//! Incremental mailbox synchronization.
//!
//! A per-user change-stream cursor is persisted across sessions; when a
//! new cursor is observed (push notification or poll), only the delta
//! since the stored cursor is fetched and prepended. Everything falls
//! back to a full refetch — delta sync is an optimization, never a
//! correctness requirement.

mod cursor;
mod history;

pub use cursor::CursorStore;
pub use history::HistorySync;
