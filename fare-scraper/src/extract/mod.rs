//! Markup extraction.
//!
//! Pure functions from page HTML to structured records. Nothing in here
//! touches the browser; the session layer hands over markup and gets back
//! [`Candidate`](crate::domain::Candidate)s and
//! [`FarePrices`](crate::domain::FarePrices).
//!
//! Every pattern that depends on the booking site's current page structure
//! lives in this module. A missing pattern degrades to an empty field and a
//! log line, never an error.

mod list;
mod operator;
mod price;

pub use list::{click_card_script, extract_candidates};
pub use price::{extract_price, extract_prices};
