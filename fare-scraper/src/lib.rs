//! SJ fare scraper server.
//!
//! Drives a headless browser through the sj.se results list for a route and
//! date, visits each departure's detail page and collects the fares of every
//! class, caching each departure so repeat requests skip the browser.

pub mod abort;
pub mod cache;
pub mod clock;
pub mod domain;
pub mod extract;
pub mod scrape;
pub mod session;
pub mod web;
