//! Scrape orchestration.
//!
//! A [`Scraper`] turns a route and date into a [`crate::domain::ScrapeResult`]:
//! it serves fully cached routes without a browser, otherwise it loads the
//! results list, filters out departures that have already left and walks the
//! rest, replaying cached departures and pricing the others through a
//! [`DetailSource`]. Progress is pushed to an [`EventSink`] in list order.

mod config;
mod events;
mod orchestrator;
mod strategy;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{ScrapeConfig, SessionMode, UnknownSessionMode};
pub use events::{EventSink, ScrapeEvent};
pub use orchestrator::{ScrapeError, ScrapeOptions, Scraper};
pub use strategy::{DetailSource, IsolatedSessions, SharedSession};
