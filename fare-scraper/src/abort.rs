//! Cooperative cancellation of running scrapes.
//!
//! A flag under `abort:from:to:date` asks the run for that route and date to
//! stop after the departure it is currently processing. The flag lives in the
//! shared key-value store, so it is advisory: a signal that lands after a
//! run's last poll does nothing, and every run clears stale flags when it
//! starts.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{CacheError, KeyValueStore};
use crate::domain::RouteDate;

pub const ABORT_NAMESPACE: &str = "abort";

#[derive(Clone)]
pub struct AbortChannel {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl AbortChannel {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: Self::DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Ask the run for `target` to stop.
    pub async fn signal(&self, target: &RouteDate) -> Result<(), CacheError> {
        let key = target.cache_key(ABORT_NAMESPACE);
        self.store.set(&key, Value::Bool(true), self.ttl).await?;
        info!(route = %target.route, date = %target.date_str(), "abort signal set");
        Ok(())
    }

    /// Read and clear the flag for `target`.
    ///
    /// Store failures read as "not aborted".
    pub async fn take(&self, target: &RouteDate) -> bool {
        let key = target.cache_key(ABORT_NAMESPACE);
        let set = match self.store.get(&key).await {
            Ok(value) => value.as_ref().is_some_and(is_raised),
            Err(e) => {
                warn!(%key, error = %e, "abort flag read failed");
                false
            }
        };
        if set {
            self.clear(target).await;
        }
        set
    }

    /// Remove any flag for `target`.
    pub async fn clear(&self, target: &RouteDate) {
        let key = target.cache_key(ABORT_NAMESPACE);
        if let Err(e) = self.store.delete(&key).await {
            warn!(%key, error = %e, "abort flag clear failed");
        }
    }

    /// Is a flag currently set for `target`? Does not clear it.
    pub async fn is_set(&self, target: &RouteDate) -> bool {
        let key = target.cache_key(ABORT_NAMESPACE);
        matches!(self.store.get(&key).await, Ok(Some(value)) if is_raised(&value))
    }
}

/// Any stored value other than `null` or `false` counts as a request to stop.
fn is_raised(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::domain::Route;
    use chrono::NaiveDate;

    fn target(day: u32) -> RouteDate {
        RouteDate::new(
            Route::new("Malmö C", "Stockholm C"),
            NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
        )
    }

    #[tokio::test]
    async fn take_reads_and_clears() {
        let abort = AbortChannel::new(MemoryStore::default().shared());
        assert!(!abort.take(&target(15)).await);

        abort.signal(&target(15)).await.unwrap();
        assert!(abort.is_set(&target(15)).await);
        assert!(abort.take(&target(15)).await);
        assert!(!abort.take(&target(15)).await);
        assert!(!abort.is_set(&target(15)).await);
    }

    #[tokio::test]
    async fn flags_are_per_route_and_date() {
        let abort = AbortChannel::new(MemoryStore::default().shared());
        abort.signal(&target(15)).await.unwrap();
        assert!(!abort.take(&target(16)).await);
        assert!(abort.take(&target(15)).await);
    }

    #[tokio::test]
    async fn clear_discards_stale_signal() {
        let abort = AbortChannel::new(MemoryStore::default().shared());
        abort.signal(&target(15)).await.unwrap();
        abort.clear(&target(15)).await;
        assert!(!abort.take(&target(15)).await);
    }

    #[tokio::test]
    async fn foreign_flag_values_read_the_same_everywhere() {
        let store = MemoryStore::default().shared();
        let abort = AbortChannel::new(Arc::clone(&store));
        let key = target(15).cache_key(ABORT_NAMESPACE);

        store
            .set(&key, Value::String("1".into()), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(abort.is_set(&target(15)).await);
        assert!(abort.take(&target(15)).await);

        store
            .set(&key, Value::Bool(false), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!abort.is_set(&target(15)).await);
        assert!(!abort.take(&target(15)).await);
    }

    #[tokio::test]
    async fn flag_expires() {
        let abort = AbortChannel::new(MemoryStore::default().shared())
            .with_ttl(Duration::from_millis(20));
        abort.signal(&target(15)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!abort.take(&target(15)).await);
    }
}
