//! The push/poll coordinator.
//!
//! Lifecycle: try to register (or reuse) the provider push
//! subscription, hold the live channel open, and forward every inbound
//! cursor as a [`SyncSignal`]. A dropped channel is reconnected with
//! exponential backoff up to a bounded attempt count; past that the
//! coordinator reverts to a fixed-interval poll signal. The
//! subscription is renewed proactively once its remaining validity
//! drops below a day.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::subscription::{PushSubscription, SubscriptionStore};
use super::{StreamFrame, SyncSignal, UpdateStream, WatchProvider};

/// Fallback poll cadence while no live channel is connected.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Renew the subscription once less than this many hours remain.
const RENEW_WINDOW_HOURS: i64 = 24;

/// Minutes to wait between renewal attempts after a failed one.
const RENEW_RETRY_MINUTES: i64 = 5;

/// Exponential backoff parameters for channel reconnection.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// First retry delay.
    pub base: Duration,
    /// Upper bound on any retry delay.
    pub cap: Duration,
    /// Reconnect attempts before giving up.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (zero-based): the base
    /// doubled per attempt, capped.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let doubled = self
            .base
            .checked_mul(2_u32.saturating_pow(attempt))
            .unwrap_or(self.cap);
        doubled.min(self.cap)
    }
}

/// Why the active loop ended.
enum LoopExit {
    /// The channel died; reconnect.
    ChannelLost,
    /// The session driver went away; stop entirely.
    SignalsClosed,
}

/// Maintains the live update channel and the polling fallback.
///
/// The coordinator never mutates session state itself; it emits
/// [`SyncSignal`]s into an mpsc channel whose receiver lives on the
/// single-threaded session driver.
#[derive(Debug)]
pub struct UpdateCoordinator<S, W> {
    stream: S,
    watch: W,
    subscriptions: SubscriptionStore,
    topic: String,
    signals: mpsc::Sender<SyncSignal>,
    backoff: BackoffPolicy,
    poll_interval: Duration,
    last_renew_attempt: Option<DateTime<Utc>>,
}

impl<S: UpdateStream, W: WatchProvider> UpdateCoordinator<S, W> {
    /// Creates a coordinator publishing into `signals`.
    pub fn new(
        stream: S,
        watch: W,
        subscriptions: SubscriptionStore,
        topic: impl Into<String>,
        signals: mpsc::Sender<SyncSignal>,
    ) -> Self {
        Self {
            stream,
            watch,
            subscriptions,
            topic: topic.into(),
            signals,
            backoff: BackoffPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_renew_attempt: None,
        }
    }

    /// Overrides the fallback poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the reconnect backoff policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs until the signal receiver is dropped.
    pub async fn run(mut self) {
        let Some(mut subscription) = self.ensure_subscription().await else {
            warn!("push subscription unavailable, falling back to polling");
            self.poll_loop().await;
            return;
        };

        // Seed delta sync from the subscription cursor so anything that
        // changed since the last session is picked up immediately.
        let seed = SyncSignal::Remote {
            cursor: Some(subscription.cursor.clone()),
            message_id: None,
        };
        if self.signals.send(seed).await.is_err() {
            return;
        }

        let mut attempt: u32 = 0;
        loop {
            match self.stream.connect().await {
                Ok(()) => {
                    info!("live update channel connected");
                    attempt = 0;
                    match self.active_loop(&mut subscription).await {
                        LoopExit::SignalsClosed => return,
                        LoopExit::ChannelLost => {}
                    }
                }
                Err(err) => warn!(%err, "live update channel connect failed"),
            }

            attempt += 1;
            if attempt > self.backoff.max_attempts {
                break;
            }
            let delay = self.backoff.delay(attempt - 1);
            debug!(attempt, ?delay, "reconnecting live update channel");
            sleep(delay).await;
        }

        warn!("live updates unavailable, falling back to polling");
        self.poll_loop().await;
    }

    /// Reuses a stored live subscription for the same topic, or
    /// registers a fresh one.
    async fn ensure_subscription(&mut self) -> Option<PushSubscription> {
        match self.subscriptions.load().await {
            Ok(Some(stored)) if stored.is_live_at(Utc::now()) && stored.topic == self.topic => {
                debug!(expires_at = %stored.expires_at, "reusing stored push subscription");
                return Some(stored);
            }
            Ok(Some(_)) => {
                debug!("stored push subscription is stale, re-registering");
                if let Err(err) = self.subscriptions.clear().await {
                    warn!(%err, "failed to clear stale push subscription");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%err, "failed to load stored push subscription"),
        }

        self.register().await
    }

    /// Registers the watch and persists the resulting record.
    async fn register(&mut self) -> Option<PushSubscription> {
        match self.watch.setup_watch(&self.topic).await {
            Ok(watch) => {
                let subscription = PushSubscription {
                    active: true,
                    expires_at: watch.expires_at,
                    cursor: watch.cursor,
                    topic: self.topic.clone(),
                };
                if let Err(err) = self.subscriptions.save(&subscription).await {
                    warn!(%err, "failed to persist push subscription");
                }
                info!(expires_at = %subscription.expires_at, "push subscription registered");
                Some(subscription)
            }
            Err(err) => {
                warn!(%err, "watch setup failed");
                None
            }
        }
    }

    /// Pumps frames while the channel is healthy, renewing the
    /// subscription when its validity runs low.
    async fn active_loop(&mut self, subscription: &mut PushSubscription) -> LoopExit {
        loop {
            let until_renewal = self.until_renewal(subscription);
            let frame = tokio::select! {
                frame = self.stream.next_frame() => Some(frame),
                () = sleep(until_renewal) => None,
            };

            match frame {
                Some(Ok(StreamFrame::Connected)) => debug!("update channel greeted"),
                Some(Ok(StreamFrame::Update { cursor, message_id })) => {
                    let signal = SyncSignal::Remote { cursor, message_id };
                    if self.signals.send(signal).await.is_err() {
                        return LoopExit::SignalsClosed;
                    }
                }
                Some(Err(err)) => {
                    warn!(%err, "live update channel dropped");
                    return LoopExit::ChannelLost;
                }
                None => self.renew(subscription).await,
            }
        }
    }

    /// Time left until the subscription should be renewed, floored at
    /// zero and spaced out after a failed attempt.
    fn until_renewal(&self, subscription: &PushSubscription) -> Duration {
        let mut renew_at = subscription.expires_at - TimeDelta::hours(RENEW_WINDOW_HOURS);
        if let Some(last) = self.last_renew_attempt {
            let retry_at = last + TimeDelta::minutes(RENEW_RETRY_MINUTES);
            if retry_at > renew_at {
                renew_at = retry_at;
            }
        }
        (renew_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Re-registers the watch with the same topic configuration.
    async fn renew(&mut self, subscription: &mut PushSubscription) {
        info!("renewing push subscription");
        self.last_renew_attempt = Some(Utc::now());
        if let Some(renewed) = self.register().await {
            *subscription = renewed;
            self.last_renew_attempt = None;
        }
    }

    /// Emits a full-refresh signal on a fixed interval until the
    /// receiver goes away.
    async fn poll_loop(&mut self) {
        info!(interval = ?self.poll_interval, "starting fallback polling");
        loop {
            sleep(self.poll_interval).await;
            if self.signals.send(SyncSignal::PollRefresh).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::service::{MailServiceError, WatchSubscription};
    use crate::updates::StreamError;

    struct ScriptedStream {
        connects: VecDeque<bool>,
        frames: VecDeque<Result<StreamFrame, String>>,
    }

    impl ScriptedStream {
        fn new(
            connects: impl IntoIterator<Item = bool>,
            frames: impl IntoIterator<Item = Result<StreamFrame, String>>,
        ) -> Self {
            Self {
                connects: connects.into_iter().collect(),
                frames: frames.into_iter().collect(),
            }
        }
    }

    impl UpdateStream for ScriptedStream {
        async fn connect(&mut self) -> Result<(), StreamError> {
            if self.connects.pop_front().unwrap_or(false) {
                Ok(())
            } else {
                Err(StreamError("no channel".to_string()))
            }
        }

        async fn next_frame(&mut self) -> Result<StreamFrame, StreamError> {
            match self.frames.pop_front() {
                Some(Ok(frame)) => Ok(frame),
                Some(Err(message)) => Err(StreamError(message)),
                None => std::future::pending().await,
            }
        }
    }

    #[derive(Clone)]
    struct StubWatch {
        calls: Arc<AtomicU32>,
        fail: bool,
        expires_in: TimeDelta,
    }

    impl StubWatch {
        fn ok(expires_in: TimeDelta) -> Self {
            Self {
                calls: Arc::new(AtomicU32::new(0)),
                fail: false,
                expires_in,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Arc::new(AtomicU32::new(0)),
                fail: true,
                expires_in: TimeDelta::zero(),
            }
        }
    }

    impl WatchProvider for StubWatch {
        async fn setup_watch(&self, _topic: &str) -> Result<WatchSubscription, MailServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MailServiceError::Provider("watch rejected".to_string()))
            } else {
                Ok(WatchSubscription {
                    cursor: "w1".to_string(),
                    expires_at: Utc::now() + self.expires_in,
                })
            }
        }

        async fn stop_watch(&self) -> Result<(), MailServiceError> {
            Ok(())
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = BackoffPolicy::default();
        let secs: Vec<u64> = (0..6).map(|a| policy.delay(a).as_secs()).collect();
        assert_eq!(secs, [1, 2, 4, 8, 16, 30]);
        assert_eq!(policy.delay(20), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_frames_then_falls_back_to_polling() {
        let (tx, mut rx) = mpsc::channel(16);
        let stream = ScriptedStream::new(
            [true],
            [
                Ok(StreamFrame::Connected),
                Ok(StreamFrame::Update {
                    cursor: Some("42".to_string()),
                    message_id: Some("m1".to_string()),
                }),
                Err("gone".to_string()),
            ],
        );
        let watch = StubWatch::ok(TimeDelta::days(7));
        let coordinator = UpdateCoordinator::new(
            stream,
            watch,
            SubscriptionStore::in_memory().await.unwrap(),
            "projects/p/topics/mail",
            tx,
        );
        let handle = tokio::spawn(coordinator.run());

        // Seeded signal from the fresh subscription.
        assert_eq!(
            rx.recv().await,
            Some(SyncSignal::Remote {
                cursor: Some("w1".to_string()),
                message_id: None,
            })
        );
        // Forwarded channel frame.
        assert_eq!(
            rx.recv().await,
            Some(SyncSignal::Remote {
                cursor: Some("42".to_string()),
                message_id: Some("m1".to_string()),
            })
        );
        // Channel dies, reconnects are exhausted, polling takes over.
        assert_eq!(rx.recv().await, Some(SyncSignal::PollRefresh));

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn watch_failure_goes_straight_to_polling() {
        let (tx, mut rx) = mpsc::channel(16);
        let watch = StubWatch::failing();
        let calls = Arc::clone(&watch.calls);
        let coordinator = UpdateCoordinator::new(
            ScriptedStream::new([], []),
            watch,
            SubscriptionStore::in_memory().await.unwrap(),
            "projects/p/topics/mail",
            tx,
        );
        let handle = tokio::spawn(coordinator.run());

        assert_eq!(rx.recv().await, Some(SyncSignal::PollRefresh));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reuses_a_live_stored_subscription() {
        let (tx, mut rx) = mpsc::channel(16);
        let store = SubscriptionStore::in_memory().await.unwrap();
        store
            .save(&PushSubscription {
                active: true,
                expires_at: Utc::now() + TimeDelta::days(6),
                cursor: "stored-7".to_string(),
                topic: "projects/p/topics/mail".to_string(),
            })
            .await
            .unwrap();

        let watch = StubWatch::ok(TimeDelta::days(7));
        let calls = Arc::clone(&watch.calls);
        let coordinator = UpdateCoordinator::new(
            ScriptedStream::new([], []),
            watch,
            store,
            "projects/p/topics/mail",
            tx,
        );
        let handle = tokio::spawn(coordinator.run());

        assert_eq!(
            rx.recv().await,
            Some(SyncSignal::Remote {
                cursor: Some("stored-7".to_string()),
                message_id: None,
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn renews_when_validity_runs_low() {
        let (tx, mut rx) = mpsc::channel(16);
        let store = SubscriptionStore::in_memory().await.unwrap();
        let soon = Utc::now() + TimeDelta::hours(1);
        store
            .save(&PushSubscription {
                active: true,
                expires_at: soon,
                cursor: "old".to_string(),
                topic: "projects/p/topics/mail".to_string(),
            })
            .await
            .unwrap();

        let watch = StubWatch::ok(TimeDelta::days(7));
        let calls = Arc::clone(&watch.calls);
        let coordinator = UpdateCoordinator::new(
            ScriptedStream::new([true], []),
            watch,
            store.clone(),
            "projects/p/topics/mail",
            tx,
        );
        let handle = tokio::spawn(coordinator.run());

        // Seeded signal first; the subscription is live but inside the
        // renewal window, so registration runs right after connecting.
        assert_eq!(
            rx.recv().await,
            Some(SyncSignal::Remote {
                cursor: Some("old".to_string()),
                message_id: None,
            })
        );
        let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
        loop {
            if calls.load(Ordering::SeqCst) >= 1
                && let Some(renewed) = store.load().await.unwrap()
                && renewed.expires_at > soon
            {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "subscription was not renewed"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.abort();
    }
}
