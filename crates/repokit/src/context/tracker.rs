use std::collections::HashMap;

use serde_json::Value;

use repokit_core::storage::{Change, RepositoryError, Result};

/// State of an entity within a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Staged for insert.
    Added,
    /// Matches the store as of the last read or save.
    Unchanged,
    /// Staged for update.
    Modified,
    /// Staged for removal.
    Deleted,
}

#[derive(Debug, Clone)]
struct Entry {
    state: EntityState,
    data: Value,
    sequence: u64,
}

type EntryKey = (&'static str, String);

/// Identity map plus staged changes of one unit of work.
///
/// Entities are held as JSON documents keyed by `(table, row key)`. Pending
/// changes commit in the order they were staged.
#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    entries: HashMap<EntryKey, Entry>,
    next_sequence: u64,
}

impl ChangeTracker {
    fn stage(&mut self, table: &'static str, key: String, state: EntityState, data: Value) {
        self.next_sequence += 1;
        self.entries.insert(
            (table, key),
            Entry {
                state,
                data,
                sequence: self.next_sequence,
            },
        );
    }

    fn entry(&self, table: &'static str, key: &str) -> Option<&Entry> {
        self.entries.get(&(table, key.to_string()))
    }

    pub fn state(&self, table: &'static str, key: &str) -> Option<EntityState> {
        self.entry(table, key).map(|e| e.state)
    }

    /// Stages an insert. Re-adding an entity staged for removal turns the
    /// removal into an update.
    pub fn add(&mut self, table: &'static str, key: String, data: Value) -> Result<()> {
        match self.state(table, &key) {
            None => self.stage(table, key, EntityState::Added, data),
            Some(EntityState::Deleted) => self.stage(table, key, EntityState::Modified, data),
            Some(_) => {
                return Err(RepositoryError::AlreadyExists {
                    entity_type: table,
                    id: key,
                })
            }
        }
        Ok(())
    }

    /// Stages a whole-document update. Untracked entities are attached as
    /// modified; pending inserts stay inserts with the new document.
    pub fn update(&mut self, table: &'static str, key: String, data: Value) {
        let state = match self.state(table, &key) {
            Some(EntityState::Added) => EntityState::Added,
            _ => EntityState::Modified,
        };
        self.stage(table, key, state, data);
    }

    /// Stages a removal. Removing a pending insert just forgets it.
    pub fn remove(&mut self, table: &'static str, key: String, data: Value) {
        match self.state(table, &key) {
            Some(EntityState::Added) => {
                self.entries.remove(&(table, key));
            }
            Some(EntityState::Deleted) => {}
            _ => self.stage(table, key, EntityState::Deleted, data),
        }
    }

    /// Tracks a row read from the store and returns the tracked document,
    /// which is the existing one when the row is already tracked.
    pub fn attach(&mut self, table: &'static str, key: String, data: Value) -> Value {
        if let Some(existing) = self.entry(table, &key) {
            return existing.data.clone();
        }
        self.stage(table, key, EntityState::Unchanged, data.clone());
        data
    }

    /// The local snapshot: tracked documents not staged for removal.
    pub fn find(&self, table: &'static str, key: &str) -> Option<&Value> {
        self.entry(table, key)
            .filter(|e| e.state != EntityState::Deleted)
            .map(|e| &e.data)
    }

    pub fn has_changes(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.state != EntityState::Unchanged)
    }

    /// Staged changes in staging order.
    pub fn pending_changes(&self) -> Vec<Change> {
        let mut pending: Vec<(&EntryKey, &Entry)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.state != EntityState::Unchanged)
            .collect();
        pending.sort_by_key(|(_, e)| e.sequence);

        pending
            .into_iter()
            .map(|(&(table, ref key), entry)| match entry.state {
                EntityState::Added => Change::Insert {
                    table,
                    key: key.clone(),
                    data: entry.data.clone(),
                },
                EntityState::Deleted => Change::Delete {
                    table,
                    key: key.clone(),
                },
                _ => Change::Update {
                    table,
                    key: key.clone(),
                    data: entry.data.clone(),
                },
            })
            .collect()
    }

    /// Marks every staged change as persisted.
    pub fn accept_changes(&mut self) {
        self.entries.retain(|_, e| e.state != EntityState::Deleted);
        for entry in self.entries.values_mut() {
            entry.state = EntityState::Unchanged;
        }
    }

    /// Stops tracking `(table, key)` whatever its state.
    pub fn detach(&mut self, table: &'static str, key: &str) {
        self.entries.remove(&(table, key.to_string()));
    }
}
