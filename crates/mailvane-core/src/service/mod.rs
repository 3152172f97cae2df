//! High-level mail operations over the provider client.

mod mail;

pub use mail::{FetchTarget, HistoryDelta, MailService, MailServiceError, WatchSubscription};
