//! Demo contexts wired up by the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use repokit_core::cache::entity_key;
use repokit_core::entity::{Auditable, CacheEntry, Entity, PrimaryEntity, SoftDeletable};
use repokit_core::model::{
    ConfigurationRegistry, ContextDefinition, EntityTypeBuilder, EntityTypeConfiguration,
    ModelBuilder,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub created_time: DateTime<Utc>,
    pub modified_time: Option<DateTime<Utc>>,
    pub created_by_user_id: Option<Uuid>,
    pub modified_by_user_id: Option<Uuid>,
    pub deleted_by_user_id: Option<Uuid>,
    pub is_deleted: bool,
    pub deleted_time: Option<DateTime<Utc>>,
}

impl Product {
    /// A product with an unassigned id and a random SKU.
    pub fn sample(index: usize) -> Self {
        let tag = Uuid::new_v4().simple().to_string();
        Self {
            id: Uuid::nil(),
            sku: format!("SKU-{}", &tag[..8]),
            name: format!("Sample product {}", index + 1),
            price_cents: 499 + 250 * index as i64,
            created_time: Utc::now(),
            modified_time: None,
            created_by_user_id: None,
            modified_by_user_id: None,
            deleted_by_user_id: None,
            is_deleted: false,
            deleted_time: None,
        }
    }
}

impl Entity for Product {
    const TABLE: &'static str = "products";

    fn row_key(&self) -> String {
        self.id.to_string()
    }
}

impl PrimaryEntity for Product {
    type Key = Uuid;

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

impl CacheEntry for Product {
    fn cache_key(&self) -> String {
        entity_key(Self::TABLE, self.id)
    }
}

impl SoftDeletable for Product {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn deleted_time(&self) -> Option<DateTime<Utc>> {
        self.deleted_time
    }
}

impl Auditable for Product {
    fn created_time(&self) -> DateTime<Utc> {
        self.created_time
    }

    fn modified_time(&self) -> Option<DateTime<Utc>> {
        self.modified_time
    }

    fn created_by_user_id(&self) -> Option<Uuid> {
        self.created_by_user_id
    }

    fn modified_by_user_id(&self) -> Option<Uuid> {
        self.modified_by_user_id
    }

    fn deleted_by_user_id(&self) -> Option<Uuid> {
        self.deleted_by_user_id
    }
}

struct ProductConfiguration;

impl EntityTypeConfiguration<Product> for ProductConfiguration {
    fn configure(&self, builder: &mut EntityTypeBuilder<'_, Product>) {
        builder.has_unique_index(&["sku"]).has_index(&["is_deleted"]);
    }
}

/// One line of the audit trail. Keys are assigned by the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn created<E: PrimaryEntity>(entity: &E) -> Self {
        let entity_id = entity.id().to_string();
        Self {
            id: format!("{}:create:{}", E::TABLE, entity_id),
            action: "create".to_string(),
            entity_type: E::TABLE.to_string(),
            entity_id,
            recorded_at: Utc::now(),
        }
    }
}

impl Entity for AuditRecord {
    const TABLE: &'static str = "audit_records";

    fn row_key(&self) -> String {
        self.id.clone()
    }
}

impl PrimaryEntity for AuditRecord {
    type Key = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

struct AuditRecordConfiguration;

impl EntityTypeConfiguration<AuditRecord> for AuditRecordConfiguration {
    fn configure(&self, builder: &mut EntityTypeBuilder<'_, AuditRecord>) {
        builder.has_index(&["entity_type", "entity_id"]);
    }
}

fn demo_configurations() -> ConfigurationRegistry {
    let mut registry = ConfigurationRegistry::new();
    registry
        .register(ProductConfiguration)
        .register(AuditRecordConfiguration);
    registry
}

pub struct Catalog;

impl ContextDefinition for Catalog {
    const NAME: &'static str = "catalog";

    fn register_entities(builder: &mut ModelBuilder) {
        builder.entity::<Product>();
    }

    fn configurations() -> ConfigurationRegistry {
        demo_configurations()
    }
}

pub struct Audit;

impl ContextDefinition for Audit {
    const NAME: &'static str = "audit";

    fn register_entities(builder: &mut ModelBuilder) {
        builder.entity::<AuditRecord>();
    }

    fn configurations() -> ConfigurationRegistry {
        demo_configurations()
    }
}
