use std::fmt;

use crate::entity::Entity;

use super::{EntityModel, EntityTypeBuilder, EntityTypeConfiguration};

type ApplyFn = Box<dyn Fn(&mut EntityModel) + Send + Sync>;

pub(crate) struct RegisteredConfiguration {
    table: &'static str,
    apply: ApplyFn,
}

impl RegisteredConfiguration {
    pub(crate) fn apply(&self, model: &mut EntityModel) {
        (self.apply)(model)
    }
}

/// Explicit list of entity configurations, keyed by entity type.
///
/// Built once at startup and handed to [`super::ModelBuilder`].
#[derive(Default)]
pub struct ConfigurationRegistry {
    entries: Vec<RegisteredConfiguration>,
}

impl ConfigurationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a configuration for entity type `E`.
    pub fn register<E, C>(&mut self, configuration: C) -> &mut Self
    where
        E: Entity,
        C: EntityTypeConfiguration<E> + Send + Sync + 'static,
    {
        self.entries.push(RegisteredConfiguration {
            table: E::TABLE,
            apply: Box::new(move |model| {
                configuration.configure(&mut EntityTypeBuilder::<E>::new(model));
            }),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tables with at least one registered configuration.
    pub fn tables(&self) -> Vec<&'static str> {
        let mut tables: Vec<&'static str> = Vec::new();
        for entry in &self.entries {
            if !tables.contains(&entry.table) {
                tables.push(entry.table);
            }
        }
        tables
    }

    pub(crate) fn configurations_for<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a RegisteredConfiguration> + 'a {
        self.entries.iter().filter(move |e| e.table == table)
    }
}

impl fmt::Debug for ConfigurationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationRegistry")
            .field("tables", &self.tables())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuilder;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Invoice {
        number: String,
        customer: String,
    }

    impl Entity for Invoice {
        const TABLE: &'static str = "invoices";

        fn row_key(&self) -> String {
            self.number.clone()
        }
    }

    struct ByCustomer;

    impl EntityTypeConfiguration<Invoice> for ByCustomer {
        fn configure(&self, builder: &mut EntityTypeBuilder<'_, Invoice>) {
            builder.has_index(&["customer"]);
        }
    }

    struct UniqueNumber;

    impl EntityTypeConfiguration<Invoice> for UniqueNumber {
        fn configure(&self, builder: &mut EntityTypeBuilder<'_, Invoice>) {
            builder.has_unique_index(&["number"]);
        }
    }

    #[test]
    fn test_multiple_configurations_for_one_entity_all_apply() {
        let mut registry = ConfigurationRegistry::new();
        registry.register(ByCustomer).register(UniqueNumber);

        let mut builder = ModelBuilder::new("billing");
        builder.entity::<Invoice>().apply_configurations_from(&registry);
        let model = builder.build().unwrap();

        let names: Vec<&str> = model
            .entity("invoices")
            .unwrap()
            .indexes
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["ix_invoices_customer", "ux_invoices_number"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tables(), vec!["invoices"]);
    }

    #[test]
    fn test_configuration_without_registered_entity_is_ignored() {
        let mut registry = ConfigurationRegistry::new();
        registry.register(ByCustomer);

        let mut builder = ModelBuilder::new("empty");
        builder.apply_configurations_from(&registry);
        let model = builder.build().unwrap();

        assert!(model.entities().is_empty());
    }
}
