use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use repokit_core::cache::{entity_key, Cache};
use repokit_core::entity::PrimaryEntity;
use repokit_core::options::{CommandOptions, QueryOptions, TrackingMode};
use repokit_core::query::{Assignment, Filter};
use repokit_core::storage::Result;

use crate::cache::CacheBroker;
use crate::context::{DbContext, EntityState, Query};
use crate::repository::{EntityRepository, PrimaryEntityRepository};

/// Cached repository decorator for id-keyed entities.
///
/// Entries live under `"{table}:{id}"`. Reads by id go local snapshot,
/// then cache, then the wrapped repository; writes persist first and then
/// refresh or evict the entry.
///
/// # Type Parameters
///
/// * `E` - The entity type
/// * `R` - The underlying repository implementation
/// * `C` - The cache implementation
pub struct CachedPrimaryEntityRepository<E, R, C> {
    repository: Arc<R>,
    broker: CacheBroker<C>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R, C> CachedPrimaryEntityRepository<E, R, C>
where
    E: PrimaryEntity,
    R: PrimaryEntityRepository<E>,
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

    fn cache_key(id: &E::Key) -> String {
        entity_key(E::TABLE, id)
    }
}

#[async_trait]
impl<E, R, C> EntityRepository<E> for CachedPrimaryEntityRepository<E, R, C>
where
    E: PrimaryEntity,
    R: PrimaryEntityRepository<E> + 'static,
    C: Cache + 'static,
{
    fn context(&self) -> &DbContext {
        self.repository.context()
    }

    async fn create(&self, entity: E, options: CommandOptions) -> Result<E> {
        // 1. Persist to storage (the wrapped repository may assign the id)
        let created = self.repository.create(entity, options).await?;

        // 2. Populate cache
        let cache_key = Self::cache_key(created.id());
        self.broker.set(&cache_key, &created).await;

        tracing::debug!(entity_type = E::TABLE, id = %created.id(), "Cached entity created");
        Ok(created)
    }

    async fn update(&self, entity: E, options: CommandOptions) -> Result<E> {
        // 1. Persist to storage
        let updated = self.repository.update(entity, options).await?;

        // 2. Refresh cache
        let cache_key = Self::cache_key(updated.id());
        self.broker.set(&cache_key, &updated).await;

        tracing::debug!(entity_type = E::TABLE, id = %updated.id(), "Cached entity updated");
        Ok(updated)
    }

    // Cached copies of rows touched here stay stale until they expire.
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
        self.broker.delete(&Self::cache_key(deleted.id())).await;

        tracing::debug!(entity_type = E::TABLE, id = %deleted.id(), "Cached entity deleted");
        Ok(deleted)
    }

    async fn delete_batch<F>(&self, transform: F) -> Result<()>
    where
        F: Fn(Query<E>) -> Query<E> + Send + Sync + 'static,
    {
        // 1. Resolve ids of the doomed rows
        let ids = transform(self.get(None, QueryOptions::no_tracking()))
            .select::<E::Key>(E::ID_FIELD)
            .to_list()
            .await?;
        let keys: Vec<String> = ids.iter().map(Self::cache_key).collect();

        // 2. Invalidate cache
        self.broker.delete_many(&keys).await;

        // 3. Remove from storage
        self.repository.delete_batch(transform).await?;

        tracing::debug!(entity_type = E::TABLE, count = keys.len(), "Cached entities deleted");
        Ok(())
    }
}

#[async_trait]
impl<E, R, C> PrimaryEntityRepository<E> for CachedPrimaryEntityRepository<E, R, C>
where
    E: PrimaryEntity,
    R: PrimaryEntityRepository<E> + 'static,
    C: Cache + 'static,
{
    async fn get_by_id(&self, id: &E::Key, options: QueryOptions) -> Result<Option<E>> {
        let context = self.context();
        let key = id.to_string();

        // Unsaved changes in this unit of work win over the cache
        if let Some(local) = context.find_local::<E>(&key).await? {
            tracing::trace!(entity_type = E::TABLE, %id, "Found entity in local snapshot");
            return Ok(Some(local));
        }

        // A staged delete must not repopulate the entry it already evicted
        if context.entry_state::<E>(&key).await == Some(EntityState::Deleted) {
            tracing::trace!(entity_type = E::TABLE, %id, "Bypassing cache for staged delete");
            return self.repository.get_by_id(id, options).await;
        }

        let repository = &self.repository;
        let found = self
            .broker
            .get_or_set(&Self::cache_key(id), || async move {
                repository.get_by_id(id, QueryOptions::no_tracking()).await
            })
            .await?;

        match found {
            Some(entity)
                if options.tracking.resolve(context.default_tracking())
                    == TrackingMode::Tracked =>
            {
                Ok(Some(context.attach(entity).await?))
            }
            other => Ok(other),
        }
    }

    async fn delete_by_id(&self, id: &E::Key, options: CommandOptions) -> Result<E> {
        // 1. Remove from storage
        let deleted = self.repository.delete_by_id(id, options).await?;

        // 2. Invalidate cache
        self.broker.delete(&Self::cache_key(id)).await;

        tracing::debug!(entity_type = E::TABLE, %id, "Cached entity deleted");
        Ok(deleted)
    }
}
