//! In-memory cache implementation with LRU eviction.
//!
//! Provides a thread-safe in-memory cache with TTL support using
//! tokio synchronization primitives and LRU eviction policy.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use repokit_core::cache::{Cache, Result};

/// A single cached value with optional expiration.
#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// In-memory cache implementation with LRU eviction.
///
/// Thread-safe cache using `Arc<RwLock<LruCache>>` for concurrent access.
/// Expired entries are dropped lazily, when next read. Cloning shares the
/// underlying store.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<LruCache<String, Slot>>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache holding at most `max_entries` values.
    /// A capacity of 0 is raised to 1.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Number of live and not yet collected expired entries.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // LRU reads update recency, so even a get needs the write lock
        let mut store = self.store.write().await;

        match store.get(key) {
            Some(slot) if slot.is_expired() => {
                store.pop(key);
                Ok(None)
            }
            Some(slot) => Ok(Some(slot.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut store = self.store.write().await;
        store.put(key.to_string(), Slot::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store.pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new(100);

        cache.set("products:1", b"value", None).await.unwrap();

        let result = cache.get("products:1").await.unwrap();
        assert_eq!(result, Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new(100);
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = MemoryCache::new(100);
        cache.set("products:1", b"value", None).await.unwrap();

        cache.delete("products:1").await.unwrap();
        cache.delete("products:1").await.unwrap();

        assert_eq!(cache.get("products:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = MemoryCache::new(100);
        cache
            .set("products:1", b"value", Some(Duration::from_millis(50)))
            .await
            .unwrap();

        assert!(cache.get("products:1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("products:1").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(2);
        cache.set("a", b"1", None).await.unwrap();
        cache.set("b", b"2", None).await.unwrap();

        // Touch "a" so "b" is the least recently used
        cache.get("a").await.unwrap();
        cache.set("c", b"3", None).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_some());
        assert_eq!(cache.get("b").await.unwrap(), None);
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised() {
        let cache = MemoryCache::new(0);
        cache.set("a", b"1", None).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }
}
