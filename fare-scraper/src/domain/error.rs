//! Domain error types.
//!
//! These errors represent malformed request input. They are distinct from
//! browser and cache failures, which never reach the caller as validation
//! problems.

/// A scrape or abort request that cannot be served as given.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// One of `from`, `to` or `date` is absent or empty
    #[error("Missing required parameters: from, to, date")]
    MissingFields,

    /// The date is not a real `YYYY-MM-DD` calendar date
    #[error("Invalid date format. Expected YYYY-MM-DD (got {0:?})")]
    InvalidDate(String),
}
