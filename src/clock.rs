// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Clock seam.
//!
//! The coordinator's behavior is dominated by randomized sleeps and the
//! recovery rules depend on wall-clock age, so both consume time through
//! this trait. Production uses the system clock; tests drive a manual
//! one and never actually wait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the calling task.
    async fn sleep(&self, duration: Duration);
}

/// Real time.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test clock: sleeping advances simulated time instantly.
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
    slept: std::sync::Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
            slept: std::sync::Mutex::new(Duration::ZERO),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Jump the clock forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }

    /// Total time the code under test asked to sleep.
    pub fn slept_total(&self) -> Duration {
        *self.slept.lock().unwrap()
    }
}

#[cfg(test)]
#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        *self.slept.lock().unwrap() += duration;
    }
}
