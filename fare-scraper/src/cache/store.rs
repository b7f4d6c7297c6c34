//! Key-value storage backing the scrape cache and the abort channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use serde_json::Value;

/// Errors from a key-value backend or from (de)serializing its values.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to encode cache value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode cache value for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A TTL-aware key-value store holding JSON values.
///
/// Physical expiry is best-effort; readers that care about freshness must
/// check the timestamp stored inside the value themselves.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// All live keys starting with `prefix`, in no particular order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process store on top of a moka cache.
#[derive(Clone)]
pub struct MemoryStore {
    entries: MokaCache<String, StoredValue>,
}

impl MemoryStore {
    pub const DEFAULT_CAPACITY: u64 = 10_000;

    pub fn new(max_capacity: u64) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { entries }
    }

    pub fn shared(self) -> Arc<dyn KeyValueStore> {
        Arc::new(self)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.entries.get(key).await.map(|stored| stored.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), StoredValue { value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStore::default();
        store.set("a", json!({"x": 1}), HOUR).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!({"x": 1})));
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = MemoryStore::default();
        store.set("a", json!(true), HOUR).await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        // Deleting a missing key is fine
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn list_keys_by_prefix() {
        let store = MemoryStore::default();
        store.set("sj:dep:A:B:2026-03-15:06:10", json!(1), HOUR).await.unwrap();
        store.set("sj:dep:A:B:2026-03-15:07:10", json!(2), HOUR).await.unwrap();
        store.set("sj:meta:A:B:2026-03-15", json!(3), HOUR).await.unwrap();
        store.entries.run_pending_tasks().await;

        let mut keys = store.list_keys("sj:dep:").await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "sj:dep:A:B:2026-03-15:06:10".to_string(),
                "sj:dep:A:B:2026-03-15:07:10".to_string(),
            ]
        );
        assert_eq!(store.list_keys("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let store = MemoryStore::default();
        store.set("short", json!(1), Duration::from_millis(20)).await.unwrap();
        store.set("long", json!(2), HOUR).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some(json!(2)));
    }
}
