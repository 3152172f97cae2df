//! Live updates: push channel, fallback polling, watch lifecycle.
//!
//! The coordinator holds a one-way event channel open when it can,
//! forwarding each inbound cursor into the history sync engine, and
//! degrades to a fixed-interval inbox poll when it can't. All state
//! mutation stays on the session side of an mpsc channel; the
//! coordinator only observes and signals.

mod coordinator;
mod subscription;

pub use coordinator::{BackoffPolicy, UpdateCoordinator};
pub use subscription::{PushSubscription, SubscriptionStore};

use thiserror::Error;

use crate::service::{MailServiceError, WatchSubscription};

/// What the session driver is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncSignal {
    /// A remote change was observed; run delta sync against this
    /// cursor.
    Remote {
        /// The cursor carried by the notification, if it had one.
        cursor: Option<String>,
        /// Id of the message that changed, when known. Informational;
        /// the delta fetch discovers the actual additions.
        message_id: Option<String>,
    },
    /// No live channel; do a full refresh of the inbox.
    PollRefresh,
}

/// A frame received from the live update channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// The channel is open.
    Connected,
    /// Something changed upstream.
    Update {
        /// Change-stream cursor, if the notifier had one.
        cursor: Option<String>,
        /// Id of the changed message, if known.
        message_id: Option<String>,
    },
}

/// Failure of the live update channel.
#[derive(Debug, Error)]
#[error("update channel error: {0}")]
pub struct StreamError(pub String);

/// A one-way live update channel.
///
/// Implementations reconnect from scratch on every [`connect`] call;
/// [`next_frame`] blocks until a frame arrives or the channel dies.
///
/// [`connect`]: UpdateStream::connect
/// [`next_frame`]: UpdateStream::next_frame
pub trait UpdateStream: Send {
    /// Establishes (or re-establishes) the channel.
    fn connect(&mut self) -> impl Future<Output = Result<(), StreamError>> + Send;

    /// Waits for the next frame.
    fn next_frame(&mut self) -> impl Future<Output = Result<StreamFrame, StreamError>> + Send;
}

impl UpdateStream for mailvane_gmail::UpdateStreamClient {
    async fn connect(&mut self) -> Result<(), StreamError> {
        Self::connect(self)
            .await
            .map_err(|err| StreamError(err.to_string()))
    }

    async fn next_frame(&mut self) -> Result<StreamFrame, StreamError> {
        match self.next_event().await {
            Ok(mailvane_gmail::StreamEvent::Connected) => Ok(StreamFrame::Connected),
            Ok(mailvane_gmail::StreamEvent::Update { cursor, message_id }) => {
                Ok(StreamFrame::Update { cursor, message_id })
            }
            Err(err) => Err(StreamError(err.to_string())),
        }
    }
}

/// Registers and tears down the provider-side push subscription.
pub trait WatchProvider: Send + Sync {
    /// Registers (or renews) the push subscription for a topic.
    fn setup_watch(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<WatchSubscription, MailServiceError>> + Send;

    /// Stops push delivery.
    fn stop_watch(&self) -> impl Future<Output = Result<(), MailServiceError>> + Send;
}
