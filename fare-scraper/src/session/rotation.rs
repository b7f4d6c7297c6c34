//! When to swap a browser session for a fresh one.
//!
//! The booking site rate-limits by session, so after a handful of detail
//! page visits the shared session is closed and replaced. Rotation only
//! happens while there is still work left; the last departure never pays
//! for a relaunch.

/// Detail visits per session before it is replaced.
pub const DEFAULT_ROTATION_THRESHOLD: u32 = 8;

#[derive(Debug, Clone)]
pub struct RotationPolicy {
    threshold: u32,
    visits: u32,
}

impl RotationPolicy {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            visits: 0,
        }
    }

    /// Count a successful detail visit in the current session.
    pub fn record_visit(&mut self) {
        self.visits += 1;
    }

    /// Should the session be replaced before the next visit?
    pub fn should_rotate(&self, more_remaining: bool) -> bool {
        more_remaining && self.visits >= self.threshold
    }

    /// Start counting for a fresh session.
    pub fn reset(&mut self) {
        self.visits = 0;
    }

    pub fn visits(&self) -> u32 {
        self.visits
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ROTATION_THRESHOLD)
    }
}
