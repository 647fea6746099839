use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use repokit_core::model::MigrationStep;
use repokit_core::query::{lookup_field, validate_field, Assignment, Filter, QuerySpec};
use repokit_core::storage::{Change, RepositoryError, Result, Store, StoredRow};

#[derive(Debug, Clone)]
struct UniqueIndex {
    name: String,
    fields: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Table {
    rows: BTreeMap<String, Value>,
    unique_indexes: Vec<UniqueIndex>,
}

impl Table {
    /// Returns the key of the first row that collides with an earlier row on
    /// a unique index. Rows with a null indexed member never collide.
    fn unique_violation(&self) -> Option<(&str, &str)> {
        for index in &self.unique_indexes {
            let mut seen = HashSet::new();
            for (key, data) in &self.rows {
                let values: Vec<&Value> = index
                    .fields
                    .iter()
                    .map(|field| lookup_field(data, field))
                    .collect();
                if values.iter().any(|value| value.is_null()) {
                    continue;
                }
                let tuple: Vec<Value> = values.into_iter().cloned().collect();
                if !seen.insert(Value::from(tuple).to_string()) {
                    return Some((index.name.as_str(), key.as_str()));
                }
            }
        }
        None
    }
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Table>,
    migrations: Vec<String>,
}

impl State {
    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| RepositoryError::QueryFailed(format!("no such table: {name}")))
    }
}

/// In-memory store for tests and development.
///
/// Cloning shares the underlying tables and counters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of query, projection and count calls served.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of commits and set-based writes served.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    /// While unavailable, every call fails with `ConnectionFailed`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::ConnectionFailed(
                "in-memory store is unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn record_read(&self) -> Result<()> {
        self.ensure_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn record_write(&self) -> Result<()> {
        self.ensure_available()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sets the member at a dotted path. Missing or non-object parents leave the
/// document untouched, like SQLite's `json_set`.
fn set_field(document: &mut Value, field: &str, value: Value) {
    let mut segments: Vec<&str> = field.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = document;
    for segment in segments {
        match current.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }

    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}

fn validate_assignments(assignments: &[Assignment]) -> Result<()> {
    assignments
        .iter()
        .try_for_each(|assignment| validate_field(&assignment.field))
}

fn unique_constraint_failed(table: &str, index: &str) -> RepositoryError {
    RepositoryError::QueryFailed(format!("UNIQUE constraint failed: {table} ({index})"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn query(&self, table: &'static str, spec: &QuerySpec) -> Result<Vec<StoredRow>> {
        self.record_read()?;
        spec.validate()?;

        let state = self.state.read().await;
        Ok(spec.apply(&state.table(table)?.rows))
    }

    async fn project(
        &self,
        table: &'static str,
        spec: &QuerySpec,
        field: &str,
    ) -> Result<Vec<Value>> {
        self.record_read()?;
        spec.validate()?;
        validate_field(field)?;

        let state = self.state.read().await;
        Ok(spec
            .apply(&state.table(table)?.rows)
            .iter()
            .map(|row| lookup_field(&row.data, field).clone())
            .collect())
    }

    async fn count(&self, table: &'static str, filter: Option<&Filter>) -> Result<u64> {
        self.record_read()?;
        if let Some(filter) = filter {
            filter.validate()?;
        }

        let state = self.state.read().await;
        let count = state
            .table(table)?
            .rows
            .iter()
            .filter(|(key, data)| filter.is_none_or(|f| f.matches(key, data)))
            .count();
        Ok(count as u64)
    }

    async fn commit(&self, changes: &[Change]) -> Result<()> {
        self.record_write()?;
        if changes.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;

        // Work on copies of the touched tables so a failing change leaves the
        // store as it was.
        let mut staged: HashMap<&'static str, Table> = HashMap::new();
        for change in changes {
            let table = change.table();
            if !staged.contains_key(table) {
                staged.insert(table, state.table(table)?.clone());
            }
            let rows = &mut staged
                .get_mut(table)
                .ok_or_else(|| RepositoryError::QueryFailed(format!("no such table: {table}")))?
                .rows;

            match change {
                Change::Insert { key, data, .. } => {
                    if rows.contains_key(key) {
                        return Err(RepositoryError::AlreadyExists {
                            entity_type: table,
                            id: key.clone(),
                        });
                    }
                    rows.insert(key.clone(), data.clone());
                }
                Change::Update { key, data, .. } => match rows.get_mut(key) {
                    Some(existing) => *existing = data.clone(),
                    None => {
                        return Err(RepositoryError::NotFound {
                            entity_type: table,
                            id: key.clone(),
                        })
                    }
                },
                Change::Delete { key, .. } => {
                    if rows.remove(key).is_none() {
                        return Err(RepositoryError::NotFound {
                            entity_type: table,
                            id: key.clone(),
                        });
                    }
                }
            }
        }

        for (table, staged_table) in &staged {
            if let Some((_, key)) = staged_table.unique_violation() {
                return Err(RepositoryError::AlreadyExists {
                    entity_type: *table,
                    id: key.to_string(),
                });
            }
        }

        for (table, staged_table) in staged {
            state.tables.insert(table.to_string(), staged_table);
        }
        Ok(())
    }

    async fn update_where(
        &self,
        table: &'static str,
        filter: Option<&Filter>,
        assignments: &[Assignment],
    ) -> Result<u64> {
        self.record_write()?;
        if let Some(filter) = filter {
            filter.validate()?;
        }
        validate_assignments(assignments)?;

        let mut state = self.state.write().await;
        let mut staged = state.table(table)?.clone();

        let mut affected = 0;
        for (key, data) in staged.rows.iter_mut() {
            if filter.is_none_or(|f| f.matches(key, data)) {
                for assignment in assignments {
                    set_field(data, &assignment.field, assignment.value.clone());
                }
                affected += 1;
            }
        }

        if let Some((index, _)) = staged.unique_violation() {
            return Err(unique_constraint_failed(table, index));
        }

        state.tables.insert(table.to_string(), staged);
        Ok(affected)
    }

    async fn delete_where(&self, table: &'static str, filter: Option<&Filter>) -> Result<u64> {
        self.record_write()?;
        if let Some(filter) = filter {
            filter.validate()?;
        }

        let mut state = self.state.write().await;
        let rows = &mut state
            .tables
            .get_mut(table)
            .ok_or_else(|| RepositoryError::QueryFailed(format!("no such table: {table}")))?
            .rows;

        let before = rows.len();
        rows.retain(|key, data| !filter.is_none_or(|f| f.matches(key, data)));
        Ok((before - rows.len()) as u64)
    }

    async fn applied_migrations(&self) -> Result<Vec<String>> {
        self.ensure_available()?;
        Ok(self.state.read().await.migrations.clone())
    }

    async fn apply_migration(&self, step: &MigrationStep) -> Result<()> {
        self.ensure_available()?;

        let mut state = self.state.write().await;
        let id = step.id();
        if state.migrations.contains(&id) {
            return Ok(());
        }

        match step {
            MigrationStep::CreateTable { table } => {
                state.tables.entry(table.clone()).or_default();
            }
            MigrationStep::CreateIndex {
                table,
                name,
                fields,
                unique,
            } => {
                let existing = state.table(table)?;
                if *unique {
                    let mut staged = existing.clone();
                    staged.unique_indexes.push(UniqueIndex {
                        name: name.clone(),
                        fields: fields.clone(),
                    });
                    if staged.unique_violation().is_some() {
                        return Err(unique_constraint_failed(table, name));
                    }
                    state.tables.insert(table.clone(), staged);
                }
            }
        }

        state.migrations.push(id);
        Ok(())
    }
}
