use async_trait::async_trait;
use serde_json::Value;

use crate::model::MigrationStep;
use crate::query::{Assignment, Filter, QuerySpec};

use super::{Change, Result, StoredRow};

/// Persistence capability consumed by units of work.
///
/// A store holds one table per entity type; each row is a key plus a JSON
/// document. Tables only exist once their `CreateTable` migration ran.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the rows of `table` selected by `spec`. Querying a table
    /// that was never created fails with `QueryFailed`.
    async fn query(&self, table: &'static str, spec: &QuerySpec) -> Result<Vec<StoredRow>>;

    /// Returns one value per selected row: the document member at `field`,
    /// `Null` when absent.
    async fn project(&self, table: &'static str, spec: &QuerySpec, field: &str) -> Result<Vec<Value>>;

    /// Counts the rows of `table` matching `filter`.
    async fn count(&self, table: &'static str, filter: Option<&Filter>) -> Result<u64>;

    /// Applies a change set atomically. Updating or deleting a missing row
    /// fails with `NotFound` and nothing is written.
    async fn commit(&self, changes: &[Change]) -> Result<()>;

    /// Set-based update of matching rows. Returns the affected row count.
    async fn update_where(
        &self,
        table: &'static str,
        filter: Option<&Filter>,
        assignments: &[Assignment],
    ) -> Result<u64>;

    /// Set-based delete of matching rows. Returns the affected row count.
    async fn delete_where(&self, table: &'static str, filter: Option<&Filter>) -> Result<u64>;

    /// Ids of migrations already applied, in application order.
    async fn applied_migrations(&self) -> Result<Vec<String>>;

    /// Applies a schema step and records it as applied.
    async fn apply_migration(&self, step: &MigrationStep) -> Result<()>;
}
