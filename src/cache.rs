//! In-process TTL cache used as a read-through accelerator in front of the
//! database. Entries carry an absolute expiry; reads past the expiry evict the
//! entry and report a miss, and a background sweeper bounds memory between
//! reads. The database stays authoritative, so losing this state on restart
//! is harmless.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::metrics::APP_METRICS;

/// Default TTL applied when `set` is called without an explicit one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default interval between background sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

impl From<CacheError> for crate::errors::ServiceError {
    fn from(err: CacheError) -> Self {
        crate::errors::ServiceError::CacheError(err.to_string())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    // An entry is still valid at the exact expiry instant.
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn has(&self, key: &str) -> Result<bool, CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
    async fn cleanup(&self) -> Result<usize, CacheError>;
}

/// Keyed in-memory store with absolute expiry. Cloning shares the underlying
/// map, so one instance constructed at startup can be handed to every service.
#[derive(Debug, Clone)]
pub struct TtlCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    default_ttl: Duration,
}

impl TtlCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores a value, unconditionally overwriting any previous entry and its
    /// expiry. Falls back to the cache-wide default TTL when none is given.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut store = self.store.write().unwrap();
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    /// Returns the value if present and unexpired. An expired entry is evicted
    /// on access and reported as a miss, never as an error.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let store = self.store.read().unwrap();
        match store.get(key) {
            Some(entry) if !entry.is_expired() => {
                APP_METRICS.record_cache_hit();
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                drop(store);
                self.evict_if_expired(key);
                APP_METRICS.record_cache_miss();
                Ok(None)
            }
            None => {
                APP_METRICS.record_cache_miss();
                Ok(None)
            }
        }
    }

    /// Presence check with the same expiry handling as `get`.
    pub async fn has(&self, key: &str) -> Result<bool, CacheError> {
        let store = self.store.read().unwrap();
        match store.get(key) {
            Some(entry) if !entry.is_expired() => Ok(true),
            Some(_) => {
                drop(store);
                self.evict_if_expired(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Unconditional removal; the write-through invalidation path.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.remove(key);
        Ok(())
    }

    /// Drops every entry.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.clear();
        Ok(())
    }

    /// Sweeps all expired entries, returning how many were removed.
    pub async fn cleanup(&self) -> Result<usize, CacheError> {
        let mut store = self.store.write().unwrap();
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired());
        let evicted = before - store.len();
        if evicted > 0 {
            APP_METRICS.cache_evictions.inc_by(evicted as u64);
        }
        Ok(evicted)
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.store.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed helper: deserialize a cached JSON value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Typed helper: serialize a value to JSON and store it.
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }

    // Re-checks under the write lock so a concurrent overwrite between lock
    // acquisitions is never clobbered.
    fn evict_if_expired(&self, key: &str) {
        let mut store = self.store.write().unwrap();
        if store.get(key).map(|e| e.is_expired()).unwrap_or(false) {
            store.remove(key);
            APP_METRICS.record_cache_eviction();
        }
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[async_trait::async_trait]
impl CacheBackend for TtlCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.set(key, value, ttl).await
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        self.has(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.delete(key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.clear().await
    }

    async fn cleanup(&self) -> Result<usize, CacheError> {
        self.cleanup().await
    }
}

/// Spawns the periodic sweep task. The returned handle is detached by callers
/// that run for the process lifetime.
pub fn spawn_sweeper(cache: TtlCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so an empty startup sweep
        // doesn't show up in the logs.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cache.cleanup().await {
                Ok(evicted) if evicted > 0 => {
                    debug!(evicted, "cache sweep removed expired entries");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("cache sweep failed: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT_TTL: Duration = Duration::from_millis(40);

    #[tokio::test]
    async fn round_trip_within_ttl() {
        let cache = TtlCache::default();
        cache.set("profile_u1", "alice", None).await.unwrap();
        assert_eq!(
            cache.get("profile_u1").await.unwrap().as_deref(),
            Some("alice")
        );
        assert!(cache.has("profile_u1").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entry_misses_and_is_evicted() {
        let cache = TtlCache::default();
        cache.set("k", "v", Some(SHORT_TTL)).await.unwrap();
        tokio::time::sleep(SHORT_TTL + Duration::from_millis(30)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        // evict-on-access removed the entry entirely
        assert_eq!(cache.len(), 0);
        assert!(!cache.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn has_evicts_expired_entries_too() {
        let cache = TtlCache::default();
        cache.set("k", "v", Some(SHORT_TTL)).await.unwrap();
        tokio::time::sleep(SHORT_TTL + Duration::from_millis(30)).await;

        assert!(!cache.has("k").await.unwrap());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_ttl() {
        let cache = TtlCache::default();
        cache.set("k", "first", Some(SHORT_TTL)).await.unwrap();
        cache.set("k", "second", None).await.unwrap();
        tokio::time::sleep(SHORT_TTL + Duration::from_millis(30)).await;

        // The second write's default TTL governs, so the entry is still live
        // past the first write's expiry.
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn delete_invalidates_before_expiry() {
        let cache = TtlCache::default();
        cache.set("orders_u1", "[]", None).await.unwrap();
        cache.delete("orders_u1").await.unwrap();
        assert_eq!(cache.get("orders_u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = TtlCache::default();
        cache.set("a", "1", None).await.unwrap();
        cache.set("b", "2", None).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn cleanup_sweeps_only_expired_entries() {
        let cache = TtlCache::default();
        cache.set("stale", "x", Some(SHORT_TTL)).await.unwrap();
        cache.set("fresh", "y", None).await.unwrap();
        tokio::time::sleep(SHORT_TTL + Duration::from_millis(30)).await;

        let evicted = cache.cleanup().await.unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh").await.unwrap().as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn json_helpers_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Snapshot {
            sku: String,
            available: i32,
        }

        let cache = TtlCache::default();
        let snap = Snapshot {
            sku: "BPC-0157".into(),
            available: 12,
        };
        cache.set_json("inventory_snapshot", &snap, None).await.unwrap();
        let loaded: Snapshot = cache
            .get_json("inventory_snapshot")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, snap);
    }
}
