mod traits;

pub use traits::{
    not_deleted, Auditable, CacheEntry, Entity, EntityKey, GeneratedKey, PrimaryEntity,
    SoftDeletable,
};
