use serde::{Deserialize, Serialize};

use super::Model;

/// One schema change derived from a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationStep {
    CreateTable {
        table: String,
    },
    CreateIndex {
        table: String,
        name: String,
        fields: Vec<String>,
        unique: bool,
    },
}

impl MigrationStep {
    /// Stable identifier recorded in the store's migration history.
    pub fn id(&self) -> String {
        match self {
            MigrationStep::CreateTable { table } => format!("create_table:{table}"),
            MigrationStep::CreateIndex { table, name, .. } => {
                format!("create_index:{table}:{name}")
            }
        }
    }

    pub fn table(&self) -> &str {
        match self {
            MigrationStep::CreateTable { table } | MigrationStep::CreateIndex { table, .. } => {
                table
            }
        }
    }
}

/// Returns the steps of `model` not yet in `applied`.
///
/// Tables come first (in registration order), then indexes, so every index
/// step runs after the table it targets.
pub fn plan_migrations(model: &Model, applied: &[String]) -> Vec<MigrationStep> {
    let tables = model.entities().iter().map(|entity| MigrationStep::CreateTable {
        table: entity.table.to_string(),
    });

    let indexes = model.entities().iter().flat_map(|entity| {
        entity.indexes.iter().map(|index| MigrationStep::CreateIndex {
            table: entity.table.to_string(),
            name: index.name.clone(),
            fields: index.fields.clone(),
            unique: index.unique,
        })
    });

    tables
        .chain(indexes)
        .filter(|step| !applied.contains(&step.id()))
        .collect()
}
