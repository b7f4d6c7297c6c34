//! Caching layer for scraped fares.
//!
//! Scraping a detail page costs a browser navigation, so every enriched
//! departure is cached on its own under `sj:dep:from:to:date:HH:MM`. A
//! per-route summary under `sj:meta:from:to:date` records which departures
//! exist, letting a later request rebuild the full result without a browser.
//!
//! Freshness is always re-checked against the timestamp written into the
//! value (`now - timestamp < ttl`), whatever the backend does about expiry.

mod store;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use store::{CacheError, KeyValueStore, MemoryStore};

use crate::clock::Clock;
use crate::domain::{Departure, RouteDate, RouteMetadata, TimingRecord};

pub const DEPARTURE_NAMESPACE: &str = "sj:dep";
pub const METADATA_NAMESPACE: &str = "sj:meta";
pub const TIMING_NAMESPACE: &str = "sj:timing";

/// A cached value and the time it was written, in epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub timestamp: i64,
}

/// Configuration for the scrape cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for per-departure entries.
    pub departure_ttl: Duration,

    /// TTL for route metadata.
    pub metadata_ttl: Duration,

    /// TTL for diagnostic timing records.
    pub timing_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            departure_ttl: Duration::from_secs(60 * 60),
            metadata_ttl: Duration::from_secs(60 * 60),
            timing_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CacheConfig {
    pub fn with_departure_ttl(mut self, ttl: Duration) -> Self {
        self.departure_ttl = ttl;
        self
    }

    pub fn with_metadata_ttl(mut self, ttl: Duration) -> Self {
        self.metadata_ttl = ttl;
        self
    }

    pub fn with_timing_ttl(mut self, ttl: Duration) -> Self {
        self.timing_ttl = ttl;
        self
    }
}

/// Is a value written at `timestamp_ms` still fresh at `now_ms`?
///
/// An entry exactly `ttl` old is stale.
pub fn is_fresh(timestamp_ms: i64, now_ms: i64, ttl: Duration) -> bool {
    let age = now_ms.saturating_sub(timestamp_ms);
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    age < ttl_ms
}

/// Typed view of the key-value store for scrape data.
///
/// Read failures are logged and reported as misses; write failures are
/// logged and dropped. Nothing here fails a scrape.
#[derive(Clone)]
pub struct ScrapeCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl ScrapeCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    /// Look up a fresh cached departure.
    pub async fn departure(&self, target: &RouteDate, departure_time: &str) -> Option<Departure> {
        let key = target.departure_key(DEPARTURE_NAMESPACE, departure_time);
        let envelope: Envelope<Departure> = self.read(&key).await?;
        if is_fresh(envelope.timestamp, self.now_ms(), self.config.departure_ttl) {
            Some(envelope.data)
        } else {
            debug!(%key, "departure cache entry expired");
            None
        }
    }

    pub async fn put_departure(&self, target: &RouteDate, departure: &Departure) {
        let key = target.departure_key(DEPARTURE_NAMESPACE, &departure.departure_time);
        let envelope = Envelope {
            data: departure,
            timestamp: self.now_ms(),
        };
        self.write(&key, &envelope, self.config.departure_ttl).await;
    }

    /// Look up fresh route metadata.
    pub async fn route_metadata(&self, target: &RouteDate) -> Option<RouteMetadata> {
        let key = target.cache_key(METADATA_NAMESPACE);
        let meta: RouteMetadata = self.read(&key).await?;
        if is_fresh(meta.timestamp, self.now_ms(), self.config.metadata_ttl) {
            Some(meta)
        } else {
            debug!(%key, "route metadata expired");
            None
        }
    }

    /// Write route metadata, stamping it with the current time.
    pub async fn put_route_metadata(&self, target: &RouteDate, mut meta: RouteMetadata) {
        let key = target.cache_key(METADATA_NAMESPACE);
        meta.timestamp = self.now_ms();
        self.write(&key, &meta, self.config.metadata_ttl).await;
    }

    /// Record diagnostic timings for one run, keyed by its finish time.
    pub async fn put_timing(&self, target: &RouteDate, timing: &TimingRecord) {
        let now = self.now_ms();
        let key = format!("{}:{now}", target.cache_key(TIMING_NAMESPACE));
        let envelope = Envelope {
            data: timing,
            timestamp: now,
        };
        self.write(&key, &envelope, self.config.timing_ttl).await;
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.store.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(%key, error = %e, "cache read failed");
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(source) => {
                let e = CacheError::Decode {
                    key: key.to_string(),
                    source,
                };
                warn!(error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let result = match serde_json::to_value(value) {
            Ok(json) => self.store.set(key, json, ttl).await,
            Err(e) => Err(CacheError::Encode(e)),
        };
        if let Err(e) = result {
            warn!(%key, error = %e, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::{FarePrices, PriceQuote, Route};
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};
    use serde_json::{Value, json};

    fn target() -> RouteDate {
        RouteDate::new(
            Route::new("Stockholm C", "Göteborg C"),
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
        )
    }

    fn departure(time: &str) -> Departure {
        Departure {
            departure_time: time.into(),
            arrival_time: "09:05".into(),
            duration: "3 h".into(),
            changes: 0,
            operator: "SJ".into(),
            prices: FarePrices {
                second_class: PriceQuote::available(695),
                second_class_calm: PriceQuote::unavailable(),
                first_class: PriceQuote::available(1295),
            },
            booking_url: "https://www.sj.se/booking".into(),
        }
    }

    fn setup() -> (ScrapeCache, Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_773_568_800, 0).unwrap(),
        ));
        let store = MemoryStore::default();
        let cache = ScrapeCache::new(
            Arc::new(store.clone()),
            clock.clone(),
            CacheConfig::default(),
        );
        (cache, clock, store)
    }

    #[test]
    fn freshness_boundary() {
        let hour = Duration::from_secs(3600);
        assert!(is_fresh(0, 3_599_999, hour));
        assert!(!is_fresh(0, 3_600_000, hour));
        assert!(!is_fresh(0, 3_600_001, hour));
        // A timestamp from the future counts as fresh
        assert!(is_fresh(10, 0, hour));
    }

    #[tokio::test]
    async fn departure_round_trip() {
        let (cache, _clock, _) = setup();
        let dep = departure("06:10");
        cache.put_departure(&target(), &dep).await;
        assert_eq!(cache.departure(&target(), "06:10").await, Some(dep));
        assert_eq!(cache.departure(&target(), "07:10").await, None);
    }

    #[tokio::test]
    async fn departure_expires_at_ttl() {
        let (cache, clock, _) = setup();
        cache.put_departure(&target(), &departure("06:10")).await;

        clock.advance(chrono::Duration::milliseconds(3_599_999));
        assert!(cache.departure(&target(), "06:10").await.is_some());

        clock.advance(chrono::Duration::milliseconds(1));
        assert!(cache.departure(&target(), "06:10").await.is_none());
        assert!(cache.departure(&target(), "06:10").await.is_none());
    }

    #[tokio::test]
    async fn persisted_layout() {
        let (cache, _clock, store) = setup();
        cache.put_departure(&target(), &departure("06:10")).await;

        let raw = store
            .get("sj:dep:Stockholm C:Göteborg C:2026-03-15:06:10")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw["timestamp"], json!(1_773_568_800_000i64));
        assert_eq!(raw["data"]["departureTime"], "06:10");
        assert_eq!(raw["data"]["prices"]["secondClassCalm"]["price"], Value::Null);
    }

    #[tokio::test]
    async fn metadata_is_stamped_on_write() {
        let (cache, clock, _) = setup();
        let meta = RouteMetadata {
            total: 1,
            departure_times: vec!["06:10".into()],
            timestamp: 0,
            incomplete: false,
            failed_departures: vec![],
        };
        cache.put_route_metadata(&target(), meta).await;

        let read = cache.route_metadata(&target()).await.unwrap();
        assert_eq!(read.timestamp, clock.now().timestamp_millis());
        assert_eq!(read.departure_times, vec!["06:10".to_string()]);

        clock.advance(chrono::Duration::hours(1));
        assert!(cache.route_metadata(&target()).await.is_none());
    }

    #[tokio::test]
    async fn timing_records_are_kept_per_run() {
        let (cache, clock, store) = setup();
        let timing = TimingRecord {
            route: "Stockholm C → Göteborg C".into(),
            date: target().date,
            list_load_ms: 1200,
            total_ms: 5000,
            scraped: 2,
            cache_hits: 1,
            failed: 0,
            rotations: 0,
            detail_ms: vec![1500, 1600],
        };
        cache.put_timing(&target(), &timing).await;
        clock.advance(chrono::Duration::seconds(1));
        cache.put_timing(&target(), &timing).await;

        let keys = store.list_keys(TIMING_NAMESPACE).await.unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn garbage_entries_are_misses() {
        let (cache, _clock, store) = setup();
        store
            .set(
                "sj:dep:Stockholm C:Göteborg C:2026-03-15:06:10",
                json!({"unexpected": true}),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(cache.departure(&target(), "06:10").await, None);
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
            Err(CacheError::Backend("unreachable".into()))
        }
        async fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("unreachable".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("unreachable".into()))
        }
        async fn list_keys(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Backend("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn backend_failures_are_swallowed() {
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(0, 0).unwrap()));
        let cache = ScrapeCache::new(Arc::new(BrokenStore), clock, CacheConfig::default());
        cache.put_departure(&target(), &departure("06:10")).await;
        assert_eq!(cache.departure(&target(), "06:10").await, None);
        assert_eq!(cache.route_metadata(&target()).await, None);
    }
}
