use async_trait::async_trait;
use serde::de::DeserializeOwned;

use repokit_core::entity::{Entity, PrimaryEntity};
use repokit_core::options::{CommandOptions, QueryOptions};
use repokit_core::query::{check_scalar, Assignment, Filter, MemberCheck};
use repokit_core::storage::Result;

use crate::context::{DbContext, Query, ScalarQuery};

/// CRUD over one entity type within a unit of work.
#[async_trait]
pub trait EntityRepository<E: Entity>: Send + Sync {
    /// The unit of work every call runs in.
    fn context(&self) -> &DbContext;

    /// A lazy query over `E`, optionally filtered, with the requested
    /// tracking. Nothing runs until a terminal operation is awaited.
    fn get(&self, filter: Option<Filter>, options: QueryOptions) -> Query<E> {
        self.context()
            .query::<E>()
            .with_tracking(options.tracking)
            .filter_opt(filter)
    }

    /// True when the projection yields a first value that equals `expected`,
    /// or, without `expected`, differs from `T::default()`.
    async fn check<T>(&self, query: ScalarQuery<T>, expected: Option<T>) -> Result<bool>
    where
        T: DeserializeOwned + Default + PartialEq + Send + Sync + 'static,
    {
        let first = query.first().await?;
        Ok(check_scalar(first, expected.as_ref()))
    }

    /// Projects `member` of the first row matching `filter`.
    async fn check_member<T>(&self, filter: Filter, member: &str) -> Result<MemberCheck<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.get(Some(filter), QueryOptions::no_tracking())
            .select::<T>(member)
            .first_member()
            .await
    }

    /// Stages `entity` for insert and saves unless the save is deferred.
    async fn create(&self, entity: E, options: CommandOptions) -> Result<E>;

    /// Stages a whole-entity update and saves unless the save is deferred.
    async fn update(&self, entity: E, options: CommandOptions) -> Result<E>;

    /// Set-based update of every row matching `filter`, without loading
    /// rows. Returns the number of rows affected.
    async fn update_batch(&self, assignments: Vec<Assignment>, filter: Option<Filter>)
        -> Result<u64>;

    /// Stages `entity` for removal and saves unless the save is deferred.
    async fn delete(&self, entity: E, options: CommandOptions) -> Result<E>;

    /// Set-based delete of the rows selected by `transform` applied to the
    /// unfiltered query.
    async fn delete_batch<F>(&self, transform: F) -> Result<()>
    where
        F: Fn(Query<E>) -> Query<E> + Send + Sync + 'static;
}

/// Id-based access for entities with a surrogate key.
#[async_trait]
pub trait PrimaryEntityRepository<E: PrimaryEntity>: EntityRepository<E> {
    /// Looks in the local snapshot first, then in the store.
    async fn get_by_id(&self, id: &E::Key, options: QueryOptions) -> Result<Option<E>>;

    /// Loads the entity and deletes it. Fails with `NotFound` when absent,
    /// without writing anything.
    async fn delete_by_id(&self, id: &E::Key, options: CommandOptions) -> Result<E>;
}
