use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio_rusqlite::Connection;

use repokit_core::model::MigrationStep;
use repokit_core::query::{validate_field, Assignment, Filter, QuerySpec};
use repokit_core::storage::{Change, RepositoryError, Result, Store, StoredRow};

use super::conversions::{row_to_member, row_to_stored, to_sql_values};
use super::error::{map_rusqlite_error_with_id, map_tokio_rusqlite_error, raise};
use super::schema::{self, SqlQuery};

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

/// Entity type reported by migration failures.
const MIGRATIONS: &str = "__repokit_migrations";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a file-based database.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_history(&conn).await?;

        Ok(Self { conn })
    }

    /// Opens a private in-memory database.
    ///
    /// Useful for testing - data is lost when the store is dropped.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_history(&conn).await?;

        Ok(Self { conn })
    }

    async fn init_history(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_MIGRATIONS_TABLE)
                .map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(|e| map_tokio_rusqlite_error(e, MIGRATIONS))
    }

    /// Runs a statement and returns the affected row count.
    async fn execute(&self, table: &'static str, query: SqlQuery) -> Result<u64> {
        self.conn
            .call(move |conn| {
                let params = to_sql_values(&query.params);
                let affected = conn
                    .execute(&query.sql, rusqlite::params_from_iter(params.iter()))
                    .map_err(wrap_err)?;
                Ok(affected as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, table))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn query(&self, table: &'static str, spec: &QuerySpec) -> Result<Vec<StoredRow>> {
        spec.validate()?;
        let query = schema::select_rows_sql(table, spec);

        self.conn
            .call(move |conn| {
                let params = to_sql_values(&query.params);
                let mut stmt = conn.prepare(&query.sql).map_err(wrap_err)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), row_to_stored)
                    .map_err(wrap_err)?;

                let mut stored = Vec::new();
                for row_result in rows {
                    stored.push(row_result.map_err(wrap_err)?);
                }
                Ok(stored)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, table))
    }

    async fn project(
        &self,
        table: &'static str,
        spec: &QuerySpec,
        field: &str,
    ) -> Result<Vec<Value>> {
        spec.validate()?;
        validate_field(field)?;
        let query = schema::select_member_sql(table, spec, field);

        self.conn
            .call(move |conn| {
                let params = to_sql_values(&query.params);
                let mut stmt = conn.prepare(&query.sql).map_err(wrap_err)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), row_to_member)
                    .map_err(wrap_err)?;

                let mut values = Vec::new();
                for row_result in rows {
                    values.push(row_result.map_err(wrap_err)?);
                }
                Ok(values)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, table))
    }

    async fn count(&self, table: &'static str, filter: Option<&Filter>) -> Result<u64> {
        if let Some(filter) = filter {
            filter.validate()?;
        }
        let query = schema::count_sql(table, filter);

        self.conn
            .call(move |conn| {
                let params = to_sql_values(&query.params);
                let count: i64 = conn
                    .query_row(
                        &query.sql,
                        rusqlite::params_from_iter(params.iter()),
                        |row| row.get(0),
                    )
                    .map_err(wrap_err)?;
                Ok(count as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, table))
    }

    async fn commit(&self, changes: &[Change]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let changes = changes.to_vec();
        let entity_type = changes[0].table();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;

                for change in &changes {
                    let table = change.table();
                    let key = change.key();
                    let affected = match change {
                        Change::Insert { data, .. } => {
                            tx.execute(&schema::insert_sql(table), (key, data.to_string()))
                        }
                        Change::Update { data, .. } => {
                            tx.execute(&schema::update_sql(table), (key, data.to_string()))
                        }
                        Change::Delete { .. } => tx.execute(&schema::delete_sql(table), [key]),
                    }
                    .map_err(|e| raise(map_rusqlite_error_with_id(&e, table, key)))?;

                    // Dropping the transaction rolls back earlier changes
                    if affected == 0 {
                        return Err(raise(RepositoryError::NotFound {
                            entity_type: table,
                            id: key.to_string(),
                        }));
                    }
                }

                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, entity_type))
    }

    async fn update_where(
        &self,
        table: &'static str,
        filter: Option<&Filter>,
        assignments: &[Assignment],
    ) -> Result<u64> {
        if let Some(filter) = filter {
            filter.validate()?;
        }
        assignments
            .iter()
            .try_for_each(|assignment| validate_field(&assignment.field))?;

        if assignments.is_empty() {
            return self.count(table, filter).await;
        }

        self.execute(table, schema::update_where_sql(table, filter, assignments))
            .await
    }

    async fn delete_where(&self, table: &'static str, filter: Option<&Filter>) -> Result<u64> {
        if let Some(filter) = filter {
            filter.validate()?;
        }

        self.execute(table, schema::delete_where_sql(table, filter))
            .await
    }

    async fn applied_migrations(&self) -> Result<Vec<String>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_APPLIED_MIGRATIONS)
                    .map_err(wrap_err)?;
                let rows = stmt.query_map([], |row| row.get(0)).map_err(wrap_err)?;

                let mut ids: Vec<String> = Vec::new();
                for row_result in rows {
                    ids.push(row_result.map_err(wrap_err)?);
                }
                Ok(ids)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, MIGRATIONS))
    }

    async fn apply_migration(&self, step: &MigrationStep) -> Result<()> {
        let ddl = match step {
            MigrationStep::CreateTable { table } => schema::create_table_sql(table),
            MigrationStep::CreateIndex {
                table,
                name,
                fields,
                unique,
            } => schema::create_index_sql(table, name, fields, *unique),
        };
        let id = step.id();
        let applied_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                tx.execute_batch(&ddl).map_err(wrap_err)?;
                tx.execute(schema::INSERT_MIGRATION, (&id, &applied_at))
                    .map_err(wrap_err)?;
                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, MIGRATIONS))
    }
}
