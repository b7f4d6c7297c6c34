//! Time sources.
//!
//! Cache freshness and past-departure filtering both read the clock; tests
//! substitute a [`ManualClock`] so TTL boundaries can be hit exactly.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Zone the booking site prints its departure times in.
pub const SITE_TZ: Tz = chrono_tz::Europe::Stockholm;

/// Wall-clock time at the booking site for the instant `at`.
pub fn site_local(at: DateTime<Utc>) -> NaiveDateTime {
    at.with_timezone(&SITE_TZ).naive_local()
}

pub trait Clock: Send + Sync {
    /// Current instant, used for cache timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Current wall-clock time in the site's zone, used to decide which
    /// departures have already left. Independent of the host's zone.
    fn local_now(&self) -> NaiveDateTime {
        site_local(self.now())
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
