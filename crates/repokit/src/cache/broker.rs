use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;

use repokit_core::cache::{deserialize_value, serialize_value, Cache};
use repokit_core::storage::Result;

/// Options applied to values written through a [`CacheBroker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheEntryOptions {
    /// Absolute expiration relative to the write. `None` never expires.
    pub ttl: Option<Duration>,
}

impl CacheEntryOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// Typed access to a byte cache.
///
/// The broker never fails because of the cache: read errors and undecodable
/// values count as misses, and write or eviction errors are logged and
/// dropped. Only the loader passed to [`CacheBroker::get_or_set`] can fail.
pub struct CacheBroker<C> {
    cache: Arc<C>,
    options: CacheEntryOptions,
}

impl<C> Clone for CacheBroker<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            options: self.options,
        }
    }
}

impl<C: Cache> CacheBroker<C> {
    pub fn new(cache: Arc<C>, options: CacheEntryOptions) -> Self {
        Self { cache, options }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn options(&self) -> CacheEntryOptions {
        self.options
    }

    /// Reads and decodes `key`. Any failure is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match deserialize_value(&bytes) {
                Ok(value) => {
                    tracing::trace!(key, "Cache hit");
                    return Some(value);
                }
                // Deserialization failed - treat as cache miss
                Err(err) => tracing::warn!(key, error = %err, "Cache value deserialization failed"),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(key, error = %err, "Cache read failed"),
        }

        tracing::trace!(key, "Cache miss");
        None
    }

    /// Returns the cached value for `key`, or runs `load` and caches what it
    /// returns. Absent results are not cached.
    ///
    /// Concurrent misses on the same key each run `load`.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, load: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<T>>> + Send,
    {
        if let Some(value) = self.get(key).await {
            return Ok(Some(value));
        }

        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.set(key, value).await;
        }
        Ok(loaded)
    }

    /// Writes `value` under `key` with the broker's options.
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) {
        let bytes = match serialize_value(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(key, error = %err, "Cache value serialization failed");
                return;
            }
        };

        if let Err(err) = self.cache.set(key, &bytes, self.options.ttl).await {
            tracing::warn!(key, error = %err, "Failed to write cache entry");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(err) = self.cache.delete(key).await {
            tracing::warn!(key, error = %err, "Failed to invalidate cache entry");
        }
    }

    /// Evicts all `keys` concurrently.
    pub async fn delete_many(&self, keys: &[String]) {
        join_all(keys.iter().map(|key| self.delete(key))).await;
    }
}
