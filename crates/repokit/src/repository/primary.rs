use async_trait::async_trait;

use repokit_core::entity::{GeneratedKey, PrimaryEntity};
use repokit_core::options::{CommandOptions, QueryOptions};
use repokit_core::query::{Assignment, Filter};
use repokit_core::storage::{RepositoryError, Result};

use crate::context::{DbContext, Query};

use super::base::EntityRepositoryBase;
use super::traits::{EntityRepository, PrimaryEntityRepository};

/// Repository for entities with a surrogate id.
///
/// With [`PrimaryEntityRepositoryBase::with_generated_keys`] every created
/// entity gets a fresh id before it is staged; otherwise ids are caller-assigned.
pub struct PrimaryEntityRepositoryBase<E: PrimaryEntity> {
    base: EntityRepositoryBase<E>,
    key_generator: Option<fn() -> E::Key>,
}

impl<E: PrimaryEntity> PrimaryEntityRepositoryBase<E> {
    pub fn new(context: DbContext) -> Self {
        Self {
            base: EntityRepositoryBase::new(context),
            key_generator: None,
        }
    }
}

impl<E> PrimaryEntityRepositoryBase<E>
where
    E: PrimaryEntity,
    E::Key: GeneratedKey,
{
    pub fn with_generated_keys(context: DbContext) -> Self {
        Self {
            base: EntityRepositoryBase::new(context),
            key_generator: Some(<E::Key as GeneratedKey>::generate),
        }
    }
}

#[async_trait]
impl<E: PrimaryEntity> EntityRepository<E> for PrimaryEntityRepositoryBase<E> {
    fn context(&self) -> &DbContext {
        self.base.context()
    }

    async fn create(&self, mut entity: E, options: CommandOptions) -> Result<E> {
        if let Some(generate) = self.key_generator {
            entity.set_id(generate());
        }
        self.base.create(entity, options).await
    }

    async fn update(&self, entity: E, options: CommandOptions) -> Result<E> {
        self.base.update(entity, options).await
    }

    async fn update_batch(
        &self,
        assignments: Vec<Assignment>,
        filter: Option<Filter>,
    ) -> Result<u64> {
        self.base.update_batch(assignments, filter).await
    }

    async fn delete(&self, entity: E, options: CommandOptions) -> Result<E> {
        self.base.delete(entity, options).await
    }

    async fn delete_batch<F>(&self, transform: F) -> Result<()>
    where
        F: Fn(Query<E>) -> Query<E> + Send + Sync + 'static,
    {
        self.base.delete_batch(transform).await
    }
}

#[async_trait]
impl<E: PrimaryEntity> PrimaryEntityRepository<E> for PrimaryEntityRepositoryBase<E> {
    async fn get_by_id(&self, id: &E::Key, options: QueryOptions) -> Result<Option<E>> {
        let key = id.to_string();

        if let Some(local) = self.context().find_local::<E>(&key).await? {
            tracing::trace!(entity_type = E::TABLE, %key, "Found entity in local snapshot");
            return Ok(Some(local));
        }

        self.get(Some(Filter::key(key)), options).first().await
    }

    async fn delete_by_id(&self, id: &E::Key, options: CommandOptions) -> Result<E> {
        let entity = self
            .get_by_id(id, QueryOptions::tracked())
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: E::TABLE,
                id: id.to_string(),
            })?;

        self.delete(entity, options).await
    }
}
