use std::marker::PhantomData;

use async_trait::async_trait;

use repokit_core::entity::Entity;
use repokit_core::options::{CommandOptions, QueryOptions};
use repokit_core::query::{Assignment, Filter};
use repokit_core::storage::Result;

use crate::context::{DbContext, Query};

use super::traits::EntityRepository;

/// Repository writing straight through a unit of work.
pub struct EntityRepositoryBase<E> {
    context: DbContext,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityRepositoryBase<E> {
    pub fn new(context: DbContext) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }

    async fn save_unless_deferred(&self, options: CommandOptions) -> Result<()> {
        if !options.skip_saving_changes {
            self.context.save_changes().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> EntityRepository<E> for EntityRepositoryBase<E> {
    fn context(&self) -> &DbContext {
        &self.context
    }

    async fn create(&self, entity: E, options: CommandOptions) -> Result<E> {
        self.context.add(&entity).await?;
        self.save_unless_deferred(options).await?;

        tracing::debug!(
            entity_type = E::TABLE,
            key = %entity.row_key(),
            deferred = options.skip_saving_changes,
            "Entity created"
        );
        Ok(entity)
    }

    async fn update(&self, entity: E, options: CommandOptions) -> Result<E> {
        self.context.update(&entity).await?;
        self.save_unless_deferred(options).await?;

        tracing::debug!(
            entity_type = E::TABLE,
            key = %entity.row_key(),
            deferred = options.skip_saving_changes,
            "Entity updated"
        );
        Ok(entity)
    }

    async fn update_batch(
        &self,
        assignments: Vec<Assignment>,
        filter: Option<Filter>,
    ) -> Result<u64> {
        self.context
            .execute_update::<E>(filter.as_ref(), &assignments)
            .await
    }

    async fn delete(&self, entity: E, options: CommandOptions) -> Result<E> {
        self.context.remove(&entity).await?;
        self.save_unless_deferred(options).await?;

        tracing::debug!(
            entity_type = E::TABLE,
            key = %entity.row_key(),
            deferred = options.skip_saving_changes,
            "Entity deleted"
        );
        Ok(entity)
    }

    async fn delete_batch<F>(&self, transform: F) -> Result<()>
    where
        F: Fn(Query<E>) -> Query<E> + Send + Sync + 'static,
    {
        let query = transform(self.get(None, QueryOptions::no_tracking()));
        self.context.execute_delete::<E>(query.spec()).await?;
        Ok(())
    }
}
