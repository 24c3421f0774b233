//! Wall-clock abstraction.
//!
//! The usage tracker, the incident time window, cache TTLs and the circuit
//! cooldown all read time through [`Clock`] instead of calling
//! `chrono::Local::now()` directly. Production code uses [`SystemClock`];
//! tests drive a [`ManualClock`] across midnight and past expiry.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Time elapsed since `earlier`; zero if the clock reads before it.
    fn since(&self, earlier: DateTime<Local>) -> Duration {
        (self.now() - earlier).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Settable clock for tests.
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

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let Ok(delta) = TimeDelta::from_std(by) else {
            return;
        };
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = now.checked_add_signed(delta) {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
