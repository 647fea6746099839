use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use repokit_core::entity::Entity;
use repokit_core::options::TrackingMode;
use repokit_core::query::{Filter, MemberCheck, OrderBy, QuerySpec};
use repokit_core::storage::{RepositoryError, Result};

use super::database::DbContext;

/// A lazily evaluated query over one entity type.
///
/// Builder methods only compose the query; nothing runs until a terminal
/// operation (`to_list`, `first`, `count`, `any`, `keys`) is awaited.
pub struct Query<E> {
    context: DbContext,
    spec: QuerySpec,
    tracking: TrackingMode,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            spec: self.spec.clone(),
            tracking: self.tracking,
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("spec", &self.spec)
            .field("tracking", &self.tracking)
            .finish()
    }
}

/// Caps a spec's `take` at `limit`.
fn limited(mut spec: QuerySpec, limit: u64) -> QuerySpec {
    spec.take = Some(spec.take.map_or(limit, |take| take.min(limit)));
    spec
}

impl<E: Entity> Query<E> {
    pub(crate) fn new(context: DbContext) -> Self {
        Self {
            context,
            spec: QuerySpec::default(),
            tracking: TrackingMode::Default,
            _entity: PhantomData,
        }
    }

    /// Adds a filter; successive filters are conjoined.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.spec = self.spec.and_filter(filter);
        self
    }

    pub fn filter_opt(self, filter: Option<Filter>) -> Self {
        match filter {
            Some(filter) => self.filter(filter),
            None => self,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.spec.order_by.push(OrderBy {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_descending(mut self, field: impl Into<String>) -> Self {
        self.spec.order_by.push(OrderBy {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn skip(mut self, count: u64) -> Self {
        self.spec.skip = Some(count);
        self
    }

    pub fn take(mut self, count: u64) -> Self {
        self.spec.take = Some(count);
        self
    }

    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn as_no_tracking(self) -> Self {
        self.with_tracking(TrackingMode::NoTracking)
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    pub fn context(&self) -> &DbContext {
        &self.context
    }

    /// Projects one document member of each selected row.
    pub fn select<T>(self, field: impl Into<String>) -> ScalarQuery<T> {
        ScalarQuery {
            context: self.context,
            table: E::TABLE,
            spec: self.spec,
            field: field.into(),
            _value: PhantomData,
        }
    }

    pub async fn to_list(self) -> Result<Vec<E>> {
        self.context.ensure_mapped::<E>()?;
        let rows = self.context.fetch_rows(E::TABLE, &self.spec).await?;
        self.context.materialize(rows, self.tracking).await
    }

    pub async fn first(self) -> Result<Option<E>> {
        let query = Self {
            spec: limited(self.spec.clone(), 1),
            ..self
        };
        Ok(query.to_list().await?.into_iter().next())
    }

    /// Row keys of the selected rows, without materializing entities.
    pub async fn keys(self) -> Result<Vec<String>> {
        self.context.ensure_mapped::<E>()?;
        let rows = self.context.fetch_rows(E::TABLE, &self.spec).await?;
        Ok(rows.into_iter().map(|row| row.key).collect())
    }

    pub async fn count(self) -> Result<u64> {
        if self.spec.skip.is_some() || self.spec.take.is_some() {
            return Ok(self.keys().await?.len() as u64);
        }
        self.context.ensure_mapped::<E>()?;
        self.context
            .fetch_count(E::TABLE, self.spec.filter.as_ref())
            .await
    }

    pub async fn any(self) -> Result<bool> {
        let query = Self {
            spec: limited(self.spec.clone(), 1),
            ..self
        };
        Ok(!query.keys().await?.is_empty())
    }
}

/// A query projecting a single document member.
pub struct ScalarQuery<T> {
    context: DbContext,
    table: &'static str,
    spec: QuerySpec,
    field: String,
    _value: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for ScalarQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarQuery")
            .field("table", &self.table)
            .field("field", &self.field)
            .field("spec", &self.spec)
            .finish()
    }
}

impl<T: DeserializeOwned> ScalarQuery<T> {
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Every projected value. Null members only decode into nullable `T`.
    pub async fn to_list(self) -> Result<Vec<T>> {
        self.context
            .fetch_members(self.table, &self.spec, &self.field)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(RepositoryError::from))
            .collect()
    }

    /// The member of the first selected row, telling apart "no row" from
    /// "null member".
    pub async fn first_member(self) -> Result<MemberCheck<T>> {
        let spec = limited(self.spec, 1);
        let values = self
            .context
            .fetch_members(self.table, &spec, &self.field)
            .await?;
        MemberCheck::from_projection(values.into_iter().next())
    }

    /// The member of the first selected row; `None` when no row matched or
    /// the member is null.
    pub async fn first(self) -> Result<Option<T>> {
        Ok(self.first_member().await?.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use repokit_core::model::{plan_migrations, ModelBuilder};
    use serde::{Deserialize, Serialize};

    use crate::context::Database;
    use crate::storage::InMemoryStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Part {
        id: String,
        name: String,
        stock: i64,
        discontinued: Option<bool>,
    }

    impl Entity for Part {
        const TABLE: &'static str = "parts";

        fn row_key(&self) -> String {
            self.id.clone()
        }
    }

    fn part(id: &str, name: &str, stock: i64) -> Part {
        Part {
            id: id.to_string(),
            name: name.to_string(),
            stock,
            discontinued: None,
        }
    }

    async fn seeded() -> (InMemoryStore, Database) {
        let store = InMemoryStore::new();
        let mut builder = ModelBuilder::new("inventory");
        builder.entity::<Part>();
        let database = Database::new(Arc::new(store.clone()), builder.build().unwrap());

        let context = database.context();
        for step in plan_migrations(database.model(), &[]) {
            context.apply_migration(&step).await.unwrap();
        }
        for p in [part("a", "Anchor", 3), part("b", "Bolt", 0), part("c", "Cable", 7)] {
            context.add(&p).await.unwrap();
        }
        context.save_changes().await.unwrap();
        store.reset_counters();

        (store, database)
    }

    #[tokio::test]
    async fn test_builder_is_lazy() {
        let (store, database) = seeded().await;

        let query = database
            .context()
            .query::<Part>()
            .filter(Filter::gt("stock", 0))
            .order_by_descending("stock");

        assert_eq!(store.read_count(), 0);

        let names: Vec<String> = query
            .to_list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Cable", "Anchor"]);
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn test_first_respects_existing_take() {
        let (_, database) = seeded().await;
        let context = database.context();

        let none = context.query::<Part>().take(0).first().await.unwrap();
        let first = context.query::<Part>().skip(1).first().await.unwrap();

        assert_eq!(none, None);
        assert_eq!(first.map(|p| p.id), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_count_and_any() {
        let (_, database) = seeded().await;
        let context = database.context();

        assert_eq!(context.query::<Part>().count().await.unwrap(), 3);
        assert_eq!(context.query::<Part>().skip(2).count().await.unwrap(), 1);
        assert!(context
            .query::<Part>()
            .filter(Filter::eq("stock", 0))
            .any()
            .await
            .unwrap());
        assert!(!context
            .query::<Part>()
            .filter(Filter::gt("stock", 100))
            .any()
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_tracked_results_resolve_to_tracked_instance() {
        let (_, database) = seeded().await;
        let context = database.context();

        let mut bolt = context
            .query::<Part>()
            .filter(Filter::key("b"))
            .first()
            .await
            .unwrap()
            .unwrap();
        bolt.stock = 10;
        context.update(&bolt).await.unwrap();

        // A second read sees the pending edit, not the stored row
        let again = context
            .query::<Part>()
            .filter(Filter::key("b"))
            .first()
            .await
            .unwrap();
        assert_eq!(again.map(|p| p.stock), Some(10));

        let untracked = context
            .query::<Part>()
            .as_no_tracking()
            .filter(Filter::key("b"))
            .first()
            .await
            .unwrap();
        assert_eq!(untracked.map(|p| p.stock), Some(0));
    }

    #[tokio::test]
    async fn test_no_tracking_leaves_tracker_empty() {
        let (_, database) = seeded().await;
        let context = database.context();

        context.query::<Part>().as_no_tracking().to_list().await.unwrap();

        assert_eq!(context.entry_state::<Part>("a").await, None);
    }

    #[tokio::test]
    async fn test_default_tracking_follows_database() {
        let (_, database) = seeded().await;
        let context = database
            .with_default_tracking(TrackingMode::NoTracking)
            .context();

        context.query::<Part>().to_list().await.unwrap();
        assert_eq!(context.entry_state::<Part>("a").await, None);

        context
            .query::<Part>()
            .with_tracking(TrackingMode::Tracked)
            .to_list()
            .await
            .unwrap();
        assert!(context.entry_state::<Part>("a").await.is_some());
    }

    #[tokio::test]
    async fn test_select_projects_members() {
        let (_, database) = seeded().await;
        let context = database.context();

        let stock: Vec<i64> = context
            .query::<Part>()
            .select("stock")
            .to_list()
            .await
            .unwrap();
        assert_eq!(stock, vec![3, 0, 7]);

        let discontinued: MemberCheck<bool> = context
            .query::<Part>()
            .select("discontinued")
            .first_member()
            .await
            .unwrap();
        assert_eq!(discontinued, MemberCheck::Null);

        let missing: MemberCheck<String> = context
            .query::<Part>()
            .filter(Filter::key("zzz"))
            .select("name")
            .first_member()
            .await
            .unwrap();
        assert_eq!(missing, MemberCheck::NoMatch);
    }

    #[tokio::test]
    async fn test_unmapped_entity_is_rejected() {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct Stray {
            id: String,
        }

        impl Entity for Stray {
            const TABLE: &'static str = "strays";

            fn row_key(&self) -> String {
                self.id.clone()
            }
        }

        let (_, database) = seeded().await;
        let result = database.context().query::<Stray>().to_list().await;

        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }
}
