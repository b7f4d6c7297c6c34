//! Web layer for the fare scraper.
//!
//! Exposes a blocking scrape endpoint, a server-sent-events variant that
//! streams progress, and a local-only endpoint for aborting a run.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, Environment, UnknownEnvironment};
