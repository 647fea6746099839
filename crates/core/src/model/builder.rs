use std::collections::HashSet;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::query::{validate_field, validate_identifier};
use crate::storage::{RepositoryError, Result};

use super::ConfigurationRegistry;

/// An index over one or more document fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

/// Model of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityModel {
    pub table: &'static str,
    pub type_name: &'static str,
    pub indexes: Vec<IndexDefinition>,
}

/// The immutable schema of a context: its entity types and their indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    name: String,
    entities: Vec<EntityModel>,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity models in registration order.
    pub fn entities(&self) -> &[EntityModel] {
        &self.entities
    }

    pub fn entity(&self, table: &str) -> Option<&EntityModel> {
        self.entities.iter().find(|e| e.table == table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.entity(table).is_some()
    }
}

/// Per-entity configuration, applied when a model is built.
pub trait EntityTypeConfiguration<E: Entity> {
    fn configure(&self, builder: &mut EntityTypeBuilder<'_, E>);
}

/// Fluent configuration of one entity type.
pub struct EntityTypeBuilder<'a, E> {
    model: &'a mut EntityModel,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> EntityTypeBuilder<'a, E> {
    pub(crate) fn new(model: &'a mut EntityModel) -> Self {
        Self {
            model,
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        self.model.table
    }

    pub fn has_index(&mut self, fields: &[&str]) -> &mut Self {
        let name = default_index_name(self.model.table, fields, false);
        self.has_named_index(name, fields, false)
    }

    pub fn has_unique_index(&mut self, fields: &[&str]) -> &mut Self {
        let name = default_index_name(self.model.table, fields, true);
        self.has_named_index(name, fields, true)
    }

    /// Adds an index, replacing any index with the same name.
    pub fn has_named_index(
        &mut self,
        name: impl Into<String>,
        fields: &[&str],
        unique: bool,
    ) -> &mut Self {
        let index = IndexDefinition {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique,
        };
        self.model.indexes.retain(|existing| existing.name != index.name);
        self.model.indexes.push(index);
        self
    }
}

fn default_index_name(table: &str, fields: &[&str], unique: bool) -> String {
    let prefix = if unique { "ux" } else { "ix" };
    format!("{}_{}_{}", prefix, table, fields.join("_").replace('.', "_"))
}

/// Collects entity types and their configuration into a [`Model`].
#[derive(Debug)]
pub struct ModelBuilder {
    name: String,
    entities: Vec<EntityModel>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
        }
    }

    /// Registers an entity type. Registering twice is a no-op.
    pub fn entity<E: Entity>(&mut self) -> &mut Self {
        if !self.entities.iter().any(|e| e.table == E::TABLE) {
            self.entities.push(EntityModel {
                table: E::TABLE,
                type_name: std::any::type_name::<E>(),
                indexes: Vec::new(),
            });
        }
        self
    }

    /// Registers `E` if needed and configures it inline.
    pub fn configure<E, F>(&mut self, configure: F) -> &mut Self
    where
        E: Entity,
        F: FnOnce(&mut EntityTypeBuilder<'_, E>),
    {
        self.entity::<E>();
        if let Some(model) = self.entity_model_mut(E::TABLE) {
            configure(&mut EntityTypeBuilder::new(model));
        }
        self
    }

    pub fn apply_configuration<E, C>(&mut self, configuration: &C) -> &mut Self
    where
        E: Entity,
        C: EntityTypeConfiguration<E>,
    {
        self.configure::<E, _>(|builder| configuration.configure(builder))
    }

    /// Applies every registered configuration whose entity type is part of
    /// this model. Configurations for other entity types are ignored.
    pub fn apply_configurations_from(&mut self, registry: &ConfigurationRegistry) -> &mut Self {
        for entity in &mut self.entities {
            for configuration in registry.configurations_for(entity.table) {
                configuration.apply(entity);
            }
        }
        self
    }

    /// Validates names and produces the model.
    pub fn build(self) -> Result<Model> {
        let mut index_names = HashSet::new();
        for entity in &self.entities {
            validate_identifier(entity.table)?;
            for index in &entity.indexes {
                validate_identifier(&index.name)?;
                if index.fields.is_empty() {
                    return Err(RepositoryError::InvalidData(format!(
                        "Index {} on {} has no fields",
                        index.name, entity.table
                    )));
                }
                index.fields.iter().try_for_each(|f| validate_field(f))?;
                if !index_names.insert(index.name.as_str()) {
                    return Err(RepositoryError::InvalidData(format!(
                        "Duplicate index name: {}",
                        index.name
                    )));
                }
            }
        }

        Ok(Model {
            name: self.name,
            entities: self.entities,
        })
    }

    fn entity_model_mut(&mut self, table: &str) -> Option<&mut EntityModel> {
        self.entities.iter_mut().find(|e| e.table == table)
    }
}

/// A persistence context: a name plus the entity types it exposes.
pub trait ContextDefinition {
    const NAME: &'static str;

    /// Registers every entity type the context exposes.
    fn register_entities(builder: &mut ModelBuilder);

    /// Configurations applied to the registered entity types.
    fn configurations() -> ConfigurationRegistry {
        ConfigurationRegistry::default()
    }

    fn build_model() -> Result<Model> {
        let mut builder = ModelBuilder::new(Self::NAME);
        Self::register_entities(&mut builder);
        builder.apply_configurations_from(&Self::configurations());
        builder.build()
    }
}
