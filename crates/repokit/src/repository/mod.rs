//! Repositories over a unit of work.
//!
//! [`EntityRepository`] is the CRUD contract for any entity type and
//! [`PrimaryEntityRepository`] adds id-based access. The base
//! implementations write through a [`crate::context::DbContext`]; the
//! decorators in [`cached`] add a cache in front of any implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! let context = database.context();
//! let products = PrimaryEntityRepositoryBase::<Product>::with_generated_keys(context);
//! let created = products.create(product, CommandOptions::default()).await?;
//! let found = products.get_by_id(created.id(), QueryOptions::default()).await?;
//! ```

mod base;
pub mod cached;
mod primary;
mod traits;

pub use base::EntityRepositoryBase;
pub use cached::{CachedEntityRepository, CachedPrimaryEntityRepository};
pub use primary::PrimaryEntityRepositoryBase;
pub use traits::{EntityRepository, PrimaryEntityRepository};
