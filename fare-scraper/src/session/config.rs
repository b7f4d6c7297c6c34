//! Browser session configuration.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::SessionError;
use crate::domain::RouteDate;

/// Results list base; the route and date are appended as path segments.
pub const DEFAULT_BASE_URL: &str = "https://www.sj.se/en/search-journey/choose-journey";

/// Lazy-load exhaustion settings.
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// Time between scroll steps. The height is sampled halfway through.
    pub delay: Duration,

    /// Give up scrolling after this long.
    pub max_time: Duration,

    /// Give up scrolling after this many steps.
    pub max_attempts: u32,

    /// Consecutive unchanged height samples that mean the list is complete.
    pub stable_polls: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
            max_time: Duration::from_secs(30),
            max_attempts: 20,
            stable_polls: 3,
        }
    }
}

/// Configuration for browser sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,

    /// Timeout for loading the results list.
    pub list_timeout: Duration,

    /// Timeout for the detail view to appear after clicking a card.
    pub detail_timeout: Duration,

    /// How long to wait for the first card after the list loads.
    pub selector_wait: Duration,

    /// How long to wait for a cookie-consent prompt.
    pub cookie_wait: Duration,

    /// How long to wait for fares on the detail page.
    pub price_wait: Duration,

    /// Interval between polls in bounded waits.
    pub poll_interval: Duration,

    pub scroll: ScrollConfig,

    /// Chrome binary; autodetected when unset.
    pub chrome_executable: Option<PathBuf>,

    pub headless: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            list_timeout: Duration::from_secs(60),
            detail_timeout: Duration::from_secs(15),
            selector_wait: Duration::from_secs(10),
            cookie_wait: Duration::from_secs(5),
            price_wait: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            scroll: ScrollConfig::default(),
            chrome_executable: None,
            headless: true,
        }
    }
}

impl SessionConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    pub fn with_detail_timeout(mut self, timeout: Duration) -> Self {
        self.detail_timeout = timeout;
        self
    }

    pub fn with_scroll(mut self, scroll: ScrollConfig) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// The results list URL for a route and date.
    ///
    /// Station names are percent-encoded as single path segments.
    pub fn list_url(&self, target: &RouteDate) -> Result<Url, SessionError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SessionError::Navigation(format!("invalid base URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| SessionError::Navigation(format!("base URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(&target.route.from)
            .push(&target.route.to)
            .push(&target.date_str());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Route;
    use chrono::NaiveDate;

    fn target(from: &str, to: &str) -> RouteDate {
        RouteDate::new(
            Route::new(from, to),
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
        )
    }

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.list_timeout, Duration::from_secs(60));
        assert_eq!(config.detail_timeout, Duration::from_secs(15));
        assert_eq!(config.scroll.stable_polls, 3);
        assert_eq!(config.scroll.max_attempts, 20);
        assert!(config.headless);
    }

    #[test]
    fn list_url_encodes_station_names() {
        let config = SessionConfig::default();
        let url = config.list_url(&target("Stockholm C", "Malmö C")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.sj.se/en/search-journey/choose-journey/Stockholm%20C/Malm%C3%B6%20C/2026-03-15"
        );
    }

    #[test]
    fn list_url_keeps_slashes_inside_segments() {
        let config = SessionConfig::default().with_base_url("https://example.test/list/");
        let url = config.list_url(&target("A/B", "C")).unwrap();
        assert_eq!(url.as_str(), "https://example.test/list/A%2FB/C/2026-03-15");
    }

    #[test]
    fn list_url_rejects_bad_base() {
        let config = SessionConfig::default().with_base_url("not a url");
        assert!(config.list_url(&target("A", "B")).is_err());
    }
}
