//! Domain types for the fare scraper.
//!
//! Plain data describing routes, departures, fares and run summaries. The
//! JSON shapes of these types are what the HTTP API and the cache store
//! exchange, so serde attributes here are part of the external contract.

mod departure;
mod error;
mod result;
mod route;
mod time;

pub use departure::{Candidate, Departure, FareClass, FarePrices, PriceQuote};
pub use error::ValidationError;
pub use result::{RouteMetadata, ScrapeResult, ScrapeStats, TimingRecord};
pub use route::{Route, RouteDate, parse_travel_date};
pub use time::{ClockTime, TimeError, duration_between, format_duration};
