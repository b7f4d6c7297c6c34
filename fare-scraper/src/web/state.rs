//! Application state for the web layer.

use std::str::FromStr;
use std::sync::Arc;

use crate::abort::AbortChannel;
use crate::scrape::Scraper;

/// Where the server is running.
///
/// Debug inputs (cache bypass, single-departure runs) and the abort endpoint
/// are only honored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Local,
    #[default]
    Production,
}

impl Environment {
    pub fn is_local(self) -> bool {
        self == Environment::Local
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment {0:?} (expected \"local\" or \"production\")")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "production" => Ok(Environment::Production),
            _ => Err(UnknownEnvironment(s.to_string())),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<Scraper>,

    /// Same channel the scraper polls
    pub abort: AbortChannel,

    pub environment: Environment,
}

impl AppState {
    pub fn new(scraper: Scraper, abort: AbortChannel, environment: Environment) -> Self {
        Self {
            scraper: Arc::new(scraper),
            abort,
            environment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_environment() {
        assert_eq!("local".parse::<Environment>(), Ok(Environment::Local));
        assert_eq!("PRODUCTION".parse::<Environment>(), Ok(Environment::Production));
        assert!("staging".parse::<Environment>().is_err());
        assert!(!Environment::default().is_local());
    }
}
