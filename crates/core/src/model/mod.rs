//! Model building and migration planning.
//!
//! Entity configuration is wired explicitly: a context definition registers its
//! entity types, and a [`ConfigurationRegistry`] maps entity types to the
//! configuration applied to them when the model is built.

mod builder;
mod migrations;
mod registry;

pub use builder::{
    ContextDefinition, EntityModel, EntityTypeBuilder, EntityTypeConfiguration, IndexDefinition,
    Model, ModelBuilder,
};
pub use migrations::{plan_migrations, MigrationStep};
pub use registry::ConfigurationRegistry;
