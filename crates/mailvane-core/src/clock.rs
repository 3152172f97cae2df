//! Injectable time source for TTL arithmetic.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// A source of "now" in epoch milliseconds.
///
/// Cache expiry is pure arithmetic over this value, so swapping the
/// system clock for a manually advanced one makes TTL behavior
/// deterministic.
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> i64 + Send + Sync>);

impl Clock {
    /// The wall clock.
    #[must_use]
    pub fn system() -> Self {
        Self(Arc::new(|| Utc::now().timestamp_millis()))
    }

    /// A clock that starts at `start_ms` and only moves when told to.
    #[must_use]
    pub fn manual(start_ms: i64) -> (Self, ManualClock) {
        let state = Arc::new(AtomicI64::new(start_ms));
        let handle = ManualClock(Arc::clone(&state));
        (
            Self(Arc::new(move || state.load(Ordering::SeqCst))),
            handle,
        )
    }

    /// Current time in epoch milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Clock").field(&self.now_ms()).finish()
    }
}

/// Handle for advancing a [`Clock::manual`] clock.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}
