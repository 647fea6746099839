//! Applies pending schema migrations for one or more named databases.

use std::collections::BTreeMap;

use futures_util::future::try_join_all;
use repokit_core::model::{plan_migrations, MigrationStep};
use repokit_core::storage::RepositoryError;
use serde::Serialize;
use thiserror::Error;

use crate::context::Database;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MigrationError {
    #[error("Unknown context: {0}")]
    UnknownContext(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

/// Outcome of migrating one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub context: String,
    /// Ids of the steps applied by this run, in order.
    pub applied: Vec<String>,
}

/// Steps of `database`'s model that its store has not applied yet.
pub async fn pending_migrations(database: &Database) -> Result<Vec<MigrationStep>> {
    let applied = database.context().applied_migrations().await?;
    Ok(plan_migrations(database.model(), &applied))
}

/// Brings `database`'s store up to date with its model, in a fresh scope.
pub async fn migrate(database: &Database) -> Result<MigrationReport> {
    let context = database.context();
    let name = database.model().name().to_string();

    let applied = context.applied_migrations().await?;
    let steps = plan_migrations(database.model(), &applied);

    let mut report = MigrationReport {
        context: name,
        applied: Vec::with_capacity(steps.len()),
    };
    for step in steps {
        context.apply_migration(&step).await?;
        tracing::info!(context = %report.context, migration = %step.id(), "Applied migration");
        report.applied.push(step.id());
    }

    if report.applied.is_empty() {
        tracing::debug!(context = %report.context, "Schema up to date");
    }
    Ok(report)
}

/// Named databases migrated on demand.
#[derive(Default)]
pub struct MigrationRunner {
    databases: BTreeMap<String, Database>,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `database` under its model's name, replacing any database
    /// registered under the same name.
    pub fn register(&mut self, database: Database) -> &mut Self {
        let name = database.model().name().to_string();
        self.databases.insert(name, database);
        self
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.databases.keys().map(String::as_str).collect()
    }

    pub async fn migrate(&self, name: &str) -> Result<MigrationReport> {
        migrate(self.database(name)?).await
    }

    /// Migrates the named databases concurrently, each in its own scope.
    ///
    /// Every name is checked before any database is touched.
    pub async fn migrate_many(&self, names: &[&str]) -> Result<Vec<MigrationReport>> {
        let databases = names
            .iter()
            .map(|name| self.database(name))
            .collect::<Result<Vec<_>>>()?;

        try_join_all(databases.into_iter().map(migrate)).await
    }

    pub async fn migrate_all(&self) -> Result<Vec<MigrationReport>> {
        try_join_all(self.databases.values().map(migrate)).await
    }

    fn database(&self, name: &str) -> Result<&Database> {
        self.databases
            .get(name)
            .ok_or_else(|| MigrationError::UnknownContext(name.to_string()))
    }
}
