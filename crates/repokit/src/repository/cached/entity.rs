use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use repokit_core::cache::Cache;
use repokit_core::entity::CacheEntry;
use repokit_core::options::{CommandOptions, QueryOptions};
use repokit_core::query::{Assignment, Filter};
use repokit_core::storage::Result;

use crate::cache::CacheBroker;
use crate::context::{DbContext, Query};
use crate::repository::EntityRepository;

/// Cached repository decorator for entities that name their own cache key.
///
/// Writes persist through the wrapped repository, then refresh or evict the
/// entry under [`CacheEntry::cache_key`].
///
/// # Type Parameters
///
/// * `E` - The entity type
/// * `R` - The underlying repository implementation
/// * `C` - The cache implementation
pub struct CachedEntityRepository<E, R, C> {
    repository: Arc<R>,
    broker: CacheBroker<C>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R, C> CachedEntityRepository<E, R, C>
where
    E: CacheEntry,
    R: EntityRepository<E>,
    C: Cache,
{
    pub fn new(repository: Arc<R>, broker: CacheBroker<C>) -> Self {
        Self {
            repository,
            broker,
            _entity: PhantomData,
        }
    }

    pub fn broker(&self) -> &CacheBroker<C> {
        &self.broker
    }
}

#[async_trait]
impl<E, R, C> EntityRepository<E> for CachedEntityRepository<E, R, C>
where
    E: CacheEntry,
    R: EntityRepository<E> + 'static,
    C: Cache + 'static,
{
    fn context(&self) -> &DbContext {
        self.repository.context()
    }

    async fn create(&self, entity: E, options: CommandOptions) -> Result<E> {
        // 1. Persist to storage
        let created = self.repository.create(entity, options).await?;

        // 2. Populate cache
        let cache_key = created.cache_key();
        self.broker.set(&cache_key, &created).await;

        tracing::debug!(entity_type = E::TABLE, %cache_key, "Cached entity created");
        Ok(created)
    }

    async fn update(&self, entity: E, options: CommandOptions) -> Result<E> {
        // 1. Persist to storage
        let updated = self.repository.update(entity, options).await?;

        // 2. Refresh cache
        let cache_key = updated.cache_key();
        self.broker.set(&cache_key, &updated).await;

        tracing::debug!(entity_type = E::TABLE, %cache_key, "Cached entity updated");
        Ok(updated)
    }

    // Rows are never loaded, so cached copies of updated rows stay stale
    // until they expire or are rewritten.
    async fn update_batch(
        &self,
        assignments: Vec<Assignment>,
        filter: Option<Filter>,
    ) -> Result<u64> {
        self.repository.update_batch(assignments, filter).await
    }

    async fn delete(&self, entity: E, options: CommandOptions) -> Result<E> {
        // 1. Remove from storage
        let deleted = self.repository.delete(entity, options).await?;

        // 2. Invalidate cache
        let cache_key = deleted.cache_key();
        self.broker.delete(&cache_key).await;

        tracing::debug!(entity_type = E::TABLE, %cache_key, "Cached entity deleted");
        Ok(deleted)
    }

    async fn delete_batch<F>(&self, transform: F) -> Result<()>
    where
        F: Fn(Query<E>) -> Query<E> + Send + Sync + 'static,
    {
        // 1. Resolve cache keys of the doomed rows
        let doomed = transform(self.get(None, QueryOptions::no_tracking()))
            .to_list()
            .await?;
        let keys: Vec<String> = doomed.iter().map(CacheEntry::cache_key).collect();

        // 2. Invalidate cache
        self.broker.delete_many(&keys).await;

        // 3. Remove from storage
        self.repository.delete_batch(transform).await?;

        tracing::debug!(entity_type = E::TABLE, count = keys.len(), "Cached entities deleted");
        Ok(())
    }
}
