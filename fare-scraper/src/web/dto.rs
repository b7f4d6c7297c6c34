//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::{RouteDate, ValidationError};
use crate::scrape::ScrapeOptions;

/// Query string shared by the scrape and abort endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeQuery {
    pub from: Option<String>,
    pub to: Option<String>,

    /// Travel date, `YYYY-MM-DD`
    pub date: Option<String>,

    /// `1` bypasses the cache (local only)
    pub no_cache: Option<String>,

    /// Only scrape this "HH:MM" departure (local only)
    pub single_departure: Option<String>,
}

impl ScrapeQuery {
    pub fn route_date(&self) -> Result<RouteDate, ValidationError> {
        RouteDate::parse(
            self.from.as_deref(),
            self.to.as_deref(),
            self.date.as_deref(),
        )
    }

    /// Run options from the debug inputs. Outside local mode they are
    /// ignored.
    pub fn options(&self, local: bool) -> ScrapeOptions {
        if !local {
            return ScrapeOptions::default();
        }
        ScrapeOptions {
            bypass_cache: self.no_cache.as_deref() == Some("1"),
            single_departure: self
                .single_departure
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// Response to an abort request.
#[derive(Debug, Serialize, Deserialize)]
pub struct AbortResponse {
    pub success: bool,
    pub message: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(no_cache: Option<&str>, single: Option<&str>) -> ScrapeQuery {
        ScrapeQuery {
            from: Some("Stockholm C".into()),
            to: Some("Malmö C".into()),
            date: Some("2026-03-15".into()),
            no_cache: no_cache.map(String::from),
            single_departure: single.map(String::from),
        }
    }

    #[test]
    fn debug_inputs_only_apply_locally() {
        let q = query(Some("1"), Some("07:30"));

        let local = q.options(true);
        assert!(local.bypass_cache);
        assert_eq!(local.single_departure.as_deref(), Some("07:30"));

        let production = q.options(false);
        assert!(!production.bypass_cache);
        assert_eq!(production.single_departure, None);
    }

    #[test]
    fn no_cache_must_be_one() {
        assert!(!query(Some("true"), None).options(true).bypass_cache);
        assert_eq!(query(None, Some("  ")).options(true).single_departure, None);
    }

    #[test]
    fn route_date_validation() {
        assert!(query(None, None).route_date().is_ok());

        let mut q = query(None, None);
        q.to = None;
        assert_eq!(q.route_date(), Err(ValidationError::MissingFields));

        q = query(None, None);
        q.date = Some("15/03/2026".into());
        assert!(matches!(
            q.route_date(),
            Err(ValidationError::InvalidDate(_))
        ));
    }
}
