//! Routes and the (route, date) pair every scrape is keyed by.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::error::ValidationError;

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"));

/// An ordered (origin, destination) station pair.
///
/// Station names are kept exactly as the caller supplied them; the booking
/// site accepts its own display names in the URL path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub from: String,
    pub to: String,
}

impl Route {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.from, self.to)
    }
}

/// A route on a specific travel date.
///
/// This is the unit of work for one scrape run and the prefix of every
/// cache key that run touches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteDate {
    pub route: Route,
    pub date: NaiveDate,
}

impl RouteDate {
    pub fn new(route: Route, date: NaiveDate) -> Self {
        Self { route, date }
    }

    /// Validate raw request fields.
    ///
    /// All three fields must be present and non-empty, and `date` must be a
    /// real calendar date written as `YYYY-MM-DD`.
    pub fn parse(
        from: Option<&str>,
        to: Option<&str>,
        date: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let (Some(from), Some(to), Some(date)) = (
            from.filter(|s| !s.is_empty()),
            to.filter(|s| !s.is_empty()),
            date.filter(|s| !s.is_empty()),
        ) else {
            return Err(ValidationError::MissingFields);
        };

        Ok(Self::new(Route::new(from, to), parse_travel_date(date)?))
    }

    /// Date formatted as it appears in URLs and cache keys.
    pub fn date_str(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Cache key for this route/date under `namespace`:
    /// `namespace:from:to:date`.
    pub fn cache_key(&self, namespace: &str) -> String {
        format!(
            "{namespace}:{}:{}:{}",
            self.route.from,
            self.route.to,
            self.date_str()
        )
    }

    /// Cache key for a single departure: `namespace:from:to:date:HH:MM`.
    pub fn departure_key(&self, namespace: &str, departure_time: &str) -> String {
        format!("{}:{departure_time}", self.cache_key(namespace))
    }
}

impl fmt::Display for RouteDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.route, self.date_str())
    }
}

/// Parse a `YYYY-MM-DD` travel date.
pub fn parse_travel_date(s: &str) -> Result<NaiveDate, ValidationError> {
    if !DATE_SHAPE.is_match(s) {
        return Err(ValidationError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate(s.to_string()))
}
