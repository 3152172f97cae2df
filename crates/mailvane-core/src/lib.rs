//! # mailvane-core
//!
//! The stateful heart of the Mailvane webmail engine.
//!
//! This crate keeps four mutable mailbox views (inbox, starred, spam,
//! trash) plus an ephemeral search view consistent across three sources
//! of change: user actions, cached list pages, and out-of-band change
//! notifications from the provider. It provides:
//!
//! - Domain models for messages, categories, and list pages
//! - A tiered cache (in-process map plus a durable `SQLite` tier)
//! - A cross-category consistency engine for star toggles
//! - A reducer-driven category state store
//! - Incremental history-based sync with durable cursors
//! - A push/poll coordinator that drives sync from live updates and
//!   falls back to fixed-interval polling
//! - The session orchestrator that wires all of the above together

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
mod clock;
mod error;
pub mod model;
pub mod service;
mod session;
pub mod state;
pub mod sync;
pub mod updates;

pub use cache::{CacheManager, CacheOptions, CacheStore, ListCache, Tier, apply_star_change};
pub use clock::{Clock, ManualClock};
pub use error::{Error, Result};
pub use model::{Category, Email, ListPage, labels};
pub use service::{FetchTarget, HistoryDelta, MailService, MailServiceError, WatchSubscription};
pub use session::MailSession;
pub use state::{CategoryStore, EmailUpdate, ListAction};
pub use sync::{CursorStore, HistorySync};
pub use updates::{
    BackoffPolicy, PushSubscription, StreamError, StreamFrame, SubscriptionStore, SyncSignal,
    UpdateCoordinator, UpdateStream, WatchProvider,
};
