use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use repokit_core::entity::Entity;
use repokit_core::model::{MigrationStep, Model};
use repokit_core::options::TrackingMode;
use repokit_core::query::{Assignment, Filter, QuerySpec};
use repokit_core::storage::{RepositoryError, Result, Store, StoredRow};

use super::query::Query;
use super::tracker::{ChangeTracker, EntityState};

/// Unique identifier of a unit of work, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A store bound to the model it serves. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn Store>,
    model: Arc<Model>,
    default_tracking: TrackingMode,
}

impl Database {
    pub fn new(store: Arc<dyn Store>, model: Model) -> Self {
        Self {
            store,
            model: Arc::new(model),
            default_tracking: TrackingMode::Tracked,
        }
    }

    /// Sets the tracking applied when a query asks for the default.
    pub fn with_default_tracking(mut self, tracking: TrackingMode) -> Self {
        self.default_tracking = tracking;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn default_tracking(&self) -> TrackingMode {
        self.default_tracking
    }

    /// Opens a new unit of work.
    pub fn context(&self) -> DbContext {
        self.context_with_cancellation(CancellationToken::new())
    }

    /// Opens a new unit of work whose store calls stop with
    /// `RepositoryError::Cancelled` once `token` fires.
    pub fn context_with_cancellation(&self, token: CancellationToken) -> DbContext {
        DbContext {
            inner: Arc::new(Inner {
                id: ContextId::new(),
                store: Arc::clone(&self.store),
                model: Arc::clone(&self.model),
                default_tracking: self.default_tracking,
                cancellation: token,
                tracker: Mutex::new(ChangeTracker::default()),
            }),
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("model", &self.model.name())
            .field("default_tracking", &self.default_tracking)
            .finish()
    }
}

struct Inner {
    id: ContextId,
    store: Arc<dyn Store>,
    model: Arc<Model>,
    default_tracking: TrackingMode,
    cancellation: CancellationToken,
    tracker: Mutex<ChangeTracker>,
}

/// A unit of work: change tracker, local snapshot and store access for one
/// logical operation.
///
/// Clones share the same unit of work. Writes staged through `add`, `update`
/// and `remove` reach the store on [`DbContext::save_changes`], in a single
/// atomic commit.
#[derive(Clone)]
pub struct DbContext {
    inner: Arc<Inner>,
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbContext")
            .field("id", &self.inner.id)
            .field("model", &self.inner.model.name())
            .finish()
    }
}

impl DbContext {
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    pub fn default_tracking(&self) -> TrackingMode {
        self.inner.default_tracking
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    /// Starts a query over every `E` in the store.
    pub fn query<E: Entity>(&self) -> Query<E> {
        Query::new(self.clone())
    }

    pub(crate) fn ensure_mapped<E: Entity>(&self) -> Result<()> {
        if self.inner.model.contains(E::TABLE) {
            return Ok(());
        }
        Err(RepositoryError::InvalidData(format!(
            "{} is not part of the {} model",
            std::any::type_name::<E>(),
            self.inner.model.name()
        )))
    }

    // ==================== Change tracking ====================

    /// Stages `entity` for insert.
    pub async fn add<E: Entity>(&self, entity: &E) -> Result<()> {
        self.ensure_mapped::<E>()?;
        let data = serde_json::to_value(entity)?;
        self.inner
            .tracker
            .lock()
            .await
            .add(E::TABLE, entity.row_key(), data)
    }

    /// Stages a whole-entity update of `entity`.
    pub async fn update<E: Entity>(&self, entity: &E) -> Result<()> {
        self.ensure_mapped::<E>()?;
        let data = serde_json::to_value(entity)?;
        self.inner
            .tracker
            .lock()
            .await
            .update(E::TABLE, entity.row_key(), data);
        Ok(())
    }

    /// Stages `entity` for removal.
    pub async fn remove<E: Entity>(&self, entity: &E) -> Result<()> {
        self.ensure_mapped::<E>()?;
        let data = serde_json::to_value(entity)?;
        self.inner
            .tracker
            .lock()
            .await
            .remove(E::TABLE, entity.row_key(), data);
        Ok(())
    }

    /// Starts tracking `entity` as unchanged. If an entity with the same key
    /// is already tracked, that instance is returned instead.
    pub async fn attach<E: Entity>(&self, entity: E) -> Result<E> {
        self.ensure_mapped::<E>()?;
        let data = serde_json::to_value(&entity)?;
        let tracked = self
            .inner
            .tracker
            .lock()
            .await
            .attach(E::TABLE, entity.row_key(), data);
        Ok(serde_json::from_value(tracked)?)
    }

    pub async fn detach<E: Entity>(&self, entity: &E) {
        self.inner
            .tracker
            .lock()
            .await
            .detach(E::TABLE, &entity.row_key());
    }

    /// Looks `key` up in the local snapshot: tracked entities that are
    /// added, modified or unchanged. Never touches the store.
    pub async fn find_local<E: Entity>(&self, key: &str) -> Result<Option<E>> {
        let tracker = self.inner.tracker.lock().await;
        match tracker.find(E::TABLE, key) {
            Some(data) => Ok(Some(serde_json::from_value(data.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn entry_state<E: Entity>(&self, key: &str) -> Option<EntityState> {
        self.inner.tracker.lock().await.state(E::TABLE, key)
    }

    pub async fn has_changes(&self) -> bool {
        self.inner.tracker.lock().await.has_changes()
    }

    /// Commits every staged change in one store transaction and returns the
    /// number of changes written. On failure nothing is written and the
    /// changes stay staged.
    pub async fn save_changes(&self) -> Result<usize> {
        let mut tracker = self.inner.tracker.lock().await;
        let changes = tracker.pending_changes();
        if changes.is_empty() {
            return Ok(0);
        }

        self.guard(self.inner.store.commit(&changes)).await?;
        tracker.accept_changes();

        tracing::debug!(context = %self.inner.id, count = changes.len(), "Saved changes");
        Ok(changes.len())
    }

    // ==================== Set-based commands ====================

    /// Updates matching `E` rows in place. Bypasses change tracking.
    pub async fn execute_update<E: Entity>(
        &self,
        filter: Option<&Filter>,
        assignments: &[Assignment],
    ) -> Result<u64> {
        self.ensure_mapped::<E>()?;
        let affected = self
            .guard(self.inner.store.update_where(E::TABLE, filter, assignments))
            .await?;

        tracing::debug!(entity_type = E::TABLE, count = affected, "Batch update");
        Ok(affected)
    }

    /// Deletes the `E` rows selected by `spec`. Bypasses change tracking.
    pub async fn execute_delete<E: Entity>(&self, spec: &QuerySpec) -> Result<u64> {
        self.ensure_mapped::<E>()?;

        let filter = if spec.skip.is_none() && spec.take.is_none() {
            spec.filter.clone()
        } else {
            // Paged selections are resolved to keys first
            let keys: Vec<String> = self
                .fetch_rows(E::TABLE, spec)
                .await?
                .into_iter()
                .map(|row| row.key)
                .collect();
            if keys.is_empty() {
                return Ok(0);
            }
            Some(Filter::keys(keys))
        };

        let affected = self
            .guard(self.inner.store.delete_where(E::TABLE, filter.as_ref()))
            .await?;

        tracing::debug!(entity_type = E::TABLE, count = affected, "Batch delete");
        Ok(affected)
    }

    // ==================== Migrations ====================

    pub async fn applied_migrations(&self) -> Result<Vec<String>> {
        self.guard(self.inner.store.applied_migrations()).await
    }

    pub async fn apply_migration(&self, step: &MigrationStep) -> Result<()> {
        self.guard(self.inner.store.apply_migration(step)).await
    }

    // ==================== Store access ====================

    pub(crate) async fn fetch_rows(
        &self,
        table: &'static str,
        spec: &QuerySpec,
    ) -> Result<Vec<StoredRow>> {
        self.guard(self.inner.store.query(table, spec)).await
    }

    pub(crate) async fn fetch_members(
        &self,
        table: &'static str,
        spec: &QuerySpec,
        field: &str,
    ) -> Result<Vec<Value>> {
        self.guard(self.inner.store.project(table, spec, field))
            .await
    }

    pub(crate) async fn fetch_count(
        &self,
        table: &'static str,
        filter: Option<&Filter>,
    ) -> Result<u64> {
        self.guard(self.inner.store.count(table, filter)).await
    }

    /// Turns stored rows into entities under the requested tracking mode.
    pub(crate) async fn materialize<E: Entity>(
        &self,
        rows: Vec<StoredRow>,
        tracking: TrackingMode,
    ) -> Result<Vec<E>> {
        match tracking.resolve(self.inner.default_tracking) {
            TrackingMode::Tracked => {
                let mut tracker = self.inner.tracker.lock().await;
                rows.into_iter()
                    .map(|row| {
                        let data = tracker.attach(E::TABLE, row.key, row.data);
                        serde_json::from_value(data).map_err(RepositoryError::from)
                    })
                    .collect()
            }
            TrackingMode::NoTrackingWithIdentityResolution => {
                let mut seen = std::collections::HashSet::new();
                rows.into_iter()
                    .filter(|row| seen.insert(row.key.clone()))
                    .map(|row| serde_json::from_value(row.data).map_err(RepositoryError::from))
                    .collect()
            }
            TrackingMode::NoTracking | TrackingMode::Default => rows
                .into_iter()
                .map(|row| serde_json::from_value(row.data).map_err(RepositoryError::from))
                .collect(),
        }
    }

    /// Runs a store call unless the context is cancelled first.
    async fn guard<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let token = &self.inner.cancellation;
        if token.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(RepositoryError::Cancelled),
            result = operation => result,
        }
    }
}
