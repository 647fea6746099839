use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A row as held by a store: its key and the entity's JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub key: String,
    pub data: Value,
}

/// One staged write, committed as part of a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert {
        table: &'static str,
        key: String,
        data: Value,
    },
    Update {
        table: &'static str,
        key: String,
        data: Value,
    },
    Delete {
        table: &'static str,
        key: String,
    },
}

impl Change {
    pub fn table(&self) -> &'static str {
        match self {
            Change::Insert { table, .. }
            | Change::Update { table, .. }
            | Change::Delete { table, .. } => table,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Change::Insert { key, .. } | Change::Update { key, .. } | Change::Delete { key, .. } => {
                key
            }
        }
    }
}
