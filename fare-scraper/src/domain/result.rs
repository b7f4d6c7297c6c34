//! Aggregate records produced at the end of a run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::departure::Departure;

/// Per-route summary written after a run.
///
/// Lists which departures made it into the per-departure cache so a later
/// request can rebuild the whole result without opening a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetadata {
    pub total: usize,
    pub departure_times: Vec<String>,
    /// Unix epoch milliseconds at write time
    pub timestamp: i64,
    pub incomplete: bool,
    pub failed_departures: Vec<String>,
}

/// Counters reported alongside the departures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeStats {
    /// Detail-page visits avoided thanks to the cache
    pub clicks_saved: usize,
    /// Pages loaded in the browser: the list plus one per scraped departure
    pub pages_visited: usize,
}

/// Outcome of one scrape run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    /// "{from} → {to}"
    pub route: String,
    pub date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub departures: Vec<Departure>,
    pub stats: ScrapeStats,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_count: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aborted: bool,
}

/// Diagnostic timings for one browser run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRecord {
    pub route: String,
    pub date: NaiveDate,
    pub list_load_ms: u64,
    pub total_ms: u64,
    pub scraped: usize,
    pub cache_hits: usize,
    pub failed: usize,
    pub rotations: usize,
    pub detail_ms: Vec<u64>,
}
