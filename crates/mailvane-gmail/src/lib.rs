//! # mailvane-gmail
//!
//! Async client for the subset of the Gmail REST API that Mailvane uses:
//! message listing and metadata, label mutations, history deltas, push
//! watch registration, and the server-sent update stream.
//!
//! The client is transport-only. It knows nothing about caching or local
//! state; it converts HTTP responses into typed values and distinguishes
//! an expired authentication from every other failure so callers can
//! trigger a re-auth instead of a retry.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod query;
mod sse;
mod types;

pub use client::GmailClient;
pub use error::{Error, Result};
pub use sse::{StreamEvent, UpdateStreamClient};
pub use types::{
    AddedMessage, Header, HistoryItem, HistoryList, MessageAdded, MessageList, MessageMetadata,
    MessageRef, Payload, Profile, WatchRequest, WatchResponse,
};
