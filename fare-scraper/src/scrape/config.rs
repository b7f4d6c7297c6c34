//! Scrape run configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::session::DEFAULT_ROTATION_THRESHOLD;

/// How detail pages get a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// One session walks every departure, rotated periodically.
    #[default]
    Shared,

    /// A fresh session, with its own fingerprint, for every detail page.
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session mode {0:?} (expected \"shared\" or \"isolated\")")]
pub struct UnknownSessionMode(pub String);

impl FromStr for SessionMode {
    type Err = UnknownSessionMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(SessionMode::Shared),
            "isolated" => Ok(SessionMode::Isolated),
            _ => Err(UnknownSessionMode(s.to_string())),
        }
    }
}

/// Configuration parameters for a scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Detail visits per shared session before it is replaced.
    pub rotation_threshold: u32,

    /// Pause between closing a rotated session and opening the next.
    pub rotation_cooldown: Duration,

    /// Pause before reloading the list and retrying a failed navigation.
    pub retry_pause: Duration,

    /// Bounds of the random pause after each detail visit.
    pub pacing_min: Duration,
    pub pacing_max: Duration,

    /// End the run at the first failed departure instead of skipping it.
    pub stop_on_first_error: bool,

    /// Departures that left up to this long ago are still listed.
    pub past_grace: Duration,

    pub session_mode: SessionMode,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            rotation_threshold: DEFAULT_ROTATION_THRESHOLD,
            rotation_cooldown: Duration::from_secs(5),
            retry_pause: Duration::from_secs(2),
            pacing_min: Duration::from_millis(100),
            pacing_max: Duration::from_millis(200),
            stop_on_first_error: false,
            past_grace: Duration::from_secs(5 * 60),
            session_mode: SessionMode::Shared,
        }
    }
}

impl ScrapeConfig {
    pub fn with_rotation_threshold(mut self, threshold: u32) -> Self {
        self.rotation_threshold = threshold;
        self
    }

    pub fn with_rotation_cooldown(mut self, cooldown: Duration) -> Self {
        self.rotation_cooldown = cooldown;
        self
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn with_pacing(mut self, min: Duration, max: Duration) -> Self {
        self.pacing_min = min;
        self.pacing_max = max.max(min);
        self
    }

    pub fn with_stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }

    pub fn with_past_grace(mut self, grace: Duration) -> Self {
        self.past_grace = grace;
        self
    }

    pub fn with_session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    /// Past grace as a calendar duration.
    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.past_grace).unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ScrapeConfig::default();
        assert_eq!(config.rotation_threshold, 8);
        assert_eq!(config.rotation_cooldown, Duration::from_secs(5));
        assert_eq!(config.grace_period(), chrono::Duration::minutes(5));
        assert!(!config.stop_on_first_error);
        assert_eq!(config.session_mode, SessionMode::Shared);
    }

    #[test]
    fn pacing_bounds_are_ordered() {
        let config = ScrapeConfig::default()
            .with_pacing(Duration::from_millis(300), Duration::from_millis(100));
        assert_eq!(config.pacing_max, Duration::from_millis(300));
    }

    #[test]
    fn parse_session_mode() {
        assert_eq!("shared".parse::<SessionMode>(), Ok(SessionMode::Shared));
        assert_eq!(" Isolated ".parse::<SessionMode>(), Ok(SessionMode::Isolated));
        assert_eq!(
            "parallel".parse::<SessionMode>(),
            Err(UnknownSessionMode("parallel".into()))
        );
    }
}
