//! Browser sessions against the booking site.
//!
//! A [`ScrapeSession`] owns one browser with the results list for a single
//! route and date loaded. The orchestrator drives it back and forth between
//! the list and detail pages; [`SessionLauncher`] creates new ones, which is
//! how rotation and per-departure isolation get fresh identities.

mod chromium;
mod config;
mod error;
mod fingerprint;
mod rotation;
mod scroll;

use async_trait::async_trait;

pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use config::{DEFAULT_BASE_URL, ScrollConfig, SessionConfig};
pub use error::SessionError;
pub use fingerprint::{Fingerprint, SITE_TIMEZONE};
pub use rotation::{DEFAULT_ROTATION_THRESHOLD, RotationPolicy};
pub use scroll::{ScrollOutcome, ScrollStop, ScrollTarget, ScrollTracker, exhaust_lazy_load};

use crate::domain::RouteDate;

/// The detail page for one departure as the browser currently shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    pub markup: String,
    /// Address of the page, handed to users as the booking link
    pub url: String,
}

/// One live browser session with a results list loaded.
#[async_trait]
pub trait ScrapeSession: Send {
    /// Current markup of the results list.
    async fn list_markup(&mut self) -> Result<String, SessionError>;

    /// Click the card for `departure_time` and wait for its detail view.
    async fn navigate_to_detail(&mut self, departure_time: &str) -> Result<(), SessionError>;

    /// Markup and address of the detail view reached by the last navigation.
    async fn detail_page(&mut self) -> Result<DetailPage, SessionError>;

    /// Reload the results list from its URL and scroll it out again.
    async fn return_to_list(&mut self) -> Result<(), SessionError>;

    /// Release the browser. Failures are logged, not returned.
    async fn close(self: Box<Self>);
}

/// Opens sessions with the results list for a route and date loaded.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn open(&self, target: &RouteDate) -> Result<Box<dyn ScrapeSession>, SessionError>;
}
