use std::fmt::{Debug, Display};
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::query::Filter;

/// A record persisted in a single table of a store.
///
/// Entities travel through stores and caches as JSON documents, so they must
/// round-trip through serde without loss.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table (or collection) holding this entity type.
    const TABLE: &'static str;

    /// Stable identity of the row within its table.
    fn row_key(&self) -> String;
}

/// Types usable as entity identifiers.
///
/// Keys are projected out of stored documents, so they deserialize from the
/// same JSON the entity serializes them into.
pub trait EntityKey:
    Serialize + DeserializeOwned + Clone + Eq + Hash + Display + Debug + Send + Sync + 'static
{
}

impl<T> EntityKey for T where
    T: Serialize + DeserializeOwned + Clone + Eq + Hash + Display + Debug + Send + Sync + 'static
{
}

/// Identifiers the repository can mint on its own.
pub trait GeneratedKey: EntityKey {
    fn generate() -> Self;
}

impl GeneratedKey for Uuid {
    fn generate() -> Self {
        Uuid::new_v4()
    }
}

/// An entity keyed by a surrogate identifier.
///
/// Implementations must return `self.id().to_string()` from
/// [`Entity::row_key`]; id lookups are issued against that string.
pub trait PrimaryEntity: Entity {
    type Key: EntityKey;

    /// Name of the document field holding the id.
    const ID_FIELD: &'static str = "id";

    fn id(&self) -> &Self::Key;

    fn set_id(&mut self, id: Self::Key);
}

/// Audit trail fields. Informational only: repositories never populate them.
pub trait Auditable {
    fn created_time(&self) -> DateTime<Utc>;

    fn modified_time(&self) -> Option<DateTime<Utc>>;

    fn created_by_user_id(&self) -> Option<Uuid>;

    fn modified_by_user_id(&self) -> Option<Uuid>;

    fn deleted_by_user_id(&self) -> Option<Uuid>;
}

/// Soft-delete capability marker.
///
/// Repositories always hard-delete; this trait only describes the shape so
/// callers can filter with [`not_deleted`].
pub trait SoftDeletable: Entity {
    /// Name of the document field holding the deleted flag.
    const IS_DELETED_FIELD: &'static str = "is_deleted";

    fn is_deleted(&self) -> bool;

    fn deleted_time(&self) -> Option<DateTime<Utc>>;
}

/// Entities stored in an external cache under a caller-defined key.
pub trait CacheEntry: Entity {
    fn cache_key(&self) -> String;
}

/// Filter excluding rows flagged as deleted. Rows without the flag are kept.
pub fn not_deleted<E: SoftDeletable>() -> Filter {
    Filter::eq(E::IS_DELETED_FIELD, false).or(Filter::is_null(E::IS_DELETED_FIELD))
}
