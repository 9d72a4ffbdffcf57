//! Injectable wall clock and timer.
//!
//! The engine never reads the system time or sleeps on its own. Hosts supply
//! a [`Clock`] so cooldowns, probing intervals and auto-close delays are
//! deterministic under test.

use crate::Timestamp;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use futures::future::LocalBoxFuture;
#[cfg(any(test, feature = "test-util"))]
use futures::future::{self, FutureExt};
#[cfg(any(test, feature = "test-util"))]
use std::cell::Cell;
use std::time::Duration;

/// Source of time and delays for the engine.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> Timestamp;

    /// Resolve after `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'_, ()>;

    /// Current time as a UTC datetime.
    fn now_utc(&self) -> DateTime<Utc> {
        millis_to_utc(self.now_ms())
    }
}

/// Convert epoch milliseconds to a UTC datetime, saturating on overflow.
pub fn millis_to_utc(ms: Timestamp) -> DateTime<Utc> {
    let ms = i64::try_from(ms).unwrap_or(i64::MAX);
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// ISO-8601 with millisecond precision and a `Z` suffix, e.g.
/// `2024-02-01T12:00:00.000Z`.
pub fn iso8601(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(any(test, feature = "test-util"))]
/// A clock that only moves when told to.
///
/// `sleep` advances the clock by the requested duration and resolves
/// immediately, so bounded-retry loops run to completion without real delays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Timestamp>,
    sleeps: Cell<u32>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub fn new(start_ms: Timestamp) -> Self {
        Self {
            now: Cell::new(start_ms),
            sleeps: Cell::new(0),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration.as_millis() as Timestamp);
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, ms: Timestamp) {
        self.now.set(ms);
    }

    /// Number of `sleep` calls made so far.
    pub fn sleep_count(&self) -> u32 {
        self.sleeps.get()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'_, ()> {
        self.sleeps.set(self.sleeps.get() + 1);
        self.advance(duration);
        future::ready(()).boxed_local()
    }
}
