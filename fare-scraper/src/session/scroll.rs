//! Lazy-load exhaustion.
//!
//! The results list only renders departures as they scroll into view. We
//! keep scrolling to the bottom until the page height stops changing for a
//! few consecutive samples, or a time or step ceiling is reached.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use super::SessionError;
use super::config::ScrollConfig;

/// Something that can be scrolled and measured.
#[async_trait]
pub trait ScrollTarget: Send + Sync {
    async fn scroll_to_bottom(&self) -> Result<(), SessionError>;

    async fn page_height(&self) -> Result<u64, SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStop {
    /// Height held steady for the configured number of samples
    Settled,
    AttemptLimit,
    TimeLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub stop: ScrollStop,
    pub attempts: u32,
    pub final_height: u64,
}

/// Bookkeeping for one exhaustion run, separate from any I/O.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    config: ScrollConfig,
    last_height: u64,
    stable: u32,
    attempts: u32,
}

impl ScrollTracker {
    pub fn new(config: ScrollConfig, initial_height: u64) -> Self {
        Self {
            config,
            last_height: initial_height,
            stable: 0,
            attempts: 0,
        }
    }

    /// Check the ceilings before taking another step.
    pub fn limit_reached(&self, elapsed: Duration) -> Option<ScrollStop> {
        if elapsed > self.config.max_time {
            Some(ScrollStop::TimeLimit)
        } else if self.attempts >= self.config.max_attempts {
            Some(ScrollStop::AttemptLimit)
        } else {
            None
        }
    }

    /// Record the height sampled after a step. Returns true once settled.
    pub fn record(&mut self, height: u64) -> bool {
        self.attempts += 1;
        if height == self.last_height {
            self.stable += 1;
        } else {
            self.stable = 0;
            self.last_height = height;
        }
        self.stable >= self.config.stable_polls
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn height(&self) -> u64 {
        self.last_height
    }
}

/// Scroll `target` until its content stops growing.
pub async fn exhaust_lazy_load<T>(
    target: &T,
    config: &ScrollConfig,
) -> Result<ScrollOutcome, SessionError>
where
    T: ScrollTarget + ?Sized,
{
    let started = Instant::now();
    let half_delay = config.delay / 2;
    let mut tracker = ScrollTracker::new(config.clone(), target.page_height().await?);

    let stop = loop {
        if let Some(limit) = tracker.limit_reached(started.elapsed()) {
            break limit;
        }

        target.scroll_to_bottom().await?;
        tokio::time::sleep(half_delay).await;

        if tracker.record(target.page_height().await?) {
            break ScrollStop::Settled;
        }
        tokio::time::sleep(config.delay - half_delay).await;
    };

    debug!(
        ?stop,
        attempts = tracker.attempts(),
        height = tracker.height(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scrolling complete"
    );

    Ok(ScrollOutcome {
        stop,
        attempts: tracker.attempts(),
        final_height: tracker.height(),
    })
}
