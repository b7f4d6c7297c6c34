//! Browser session error types.

use std::time::Duration;

/// Errors from driving a browser session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The browser could not be started or configured
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// A page load or in-page navigation failed
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A bounded wait ran out
    #[error("timed out after {elapsed:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        elapsed: Duration,
    },

    /// No clickable card for the requested departure in the current list
    #[error("no departure card found for {0}")]
    ElementNotFound(String),

    /// The browser rejected or failed a protocol command or page script
    #[error("browser command failed: {0}")]
    Script(String),

    /// The browser went away underneath the session
    #[error("browser session closed")]
    Closed,
}

impl SessionError {
    pub fn timeout(waiting_for: impl Into<String>, elapsed: Duration) -> Self {
        SessionError::Timeout {
            waiting_for: waiting_for.into(),
            elapsed,
        }
    }

    /// Whether the failure is confined to one departure.
    ///
    /// Recoverable errors leave the session usable after a list reload.
    /// Anything else means the session itself is gone.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Navigation(_)
                | SessionError::Timeout { .. }
                | SessionError::ElementNotFound(_)
        )
    }
}
