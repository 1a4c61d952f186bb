//! Wall-clock abstraction.
//!
//! Calendar buckets are derived from local time, and the observation log
//! stores epoch seconds, so every component that needs "now" goes through a
//! [`Clock`]. Production code uses [`SystemClock`]; tests drive a
//! [`ManualClock`] forward explicitly.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Current time as fractional seconds since the unix epoch.
    fn epoch_secs(&self) -> f64 {
        epoch_secs(&self.now())
    }
}

/// Convert a timestamp into fractional epoch seconds.
pub fn epoch_secs(at: &DateTime<Local>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
