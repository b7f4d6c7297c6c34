use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use fare_scraper::abort::AbortChannel;
use fare_scraper::cache::{CacheConfig, MemoryStore, ScrapeCache};
use fare_scraper::clock::SystemClock;
use fare_scraper::scrape::{ScrapeConfig, Scraper, SessionMode};
use fare_scraper::session::{ChromiumLauncher, SessionConfig};
use fare_scraper::web::{AppState, Environment, create_router};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Parse an optional environment variable, falling back to the default
/// (with a warning) when it is set to something unusable.
fn env_or_default<T>(name: &str) -> T
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!(variable = name, value = %raw, error = %e, "ignoring invalid setting");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fare_scraper=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let environment: Environment = env_or_default("FARE_ENVIRONMENT");
    let session_mode: SessionMode = env_or_default("FARE_SESSION_MODE");
    let stop_on_first_error: bool = env_or_default("FARE_STOP_ON_FIRST_ERROR");

    let mut session_config = SessionConfig::default();
    if let Ok(path) = std::env::var("CHROME_PATH") {
        session_config = session_config.with_chrome_executable(path);
    }

    let store = MemoryStore::default().shared();
    let clock = Arc::new(SystemClock);
    let cache = ScrapeCache::new(Arc::clone(&store), clock.clone(), CacheConfig::default());
    let abort = AbortChannel::new(store);

    let scrape_config = ScrapeConfig::default()
        .with_session_mode(session_mode)
        .with_stop_on_first_error(stop_on_first_error);
    let scraper = Scraper::new(
        Arc::new(ChromiumLauncher::new(session_config)),
        cache,
        abort.clone(),
        clock,
        scrape_config,
    );

    let state = AppState::new(scraper, abort, environment);
    let app = create_router(state);

    let addr: SocketAddr = std::env::var("FARE_BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()
        .expect("FARE_BIND_ADDR must be a socket address");

    info!(%addr, ?environment, ?session_mode, "fare scraper listening");
    info!("  GET  /health              - Health check");
    info!("  GET  /api/scrape          - Scrape a route and date");
    info!("  GET  /api/scrape-stream   - Scrape with server-sent progress events");
    if environment.is_local() {
        info!("  POST /api/abort-scrape    - Stop a running scrape");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}
