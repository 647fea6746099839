//! Cache-aside decorators for repositories.
//!
//! Both decorators wrap any repository implementation together with a
//! [`crate::cache::CacheBroker`]:
//! - **Reads** by id check the local snapshot, then the cache, then the
//!   wrapped repository, populating the cache on a store hit
//! - **Writes** go to the wrapped repository first; the cache is only
//!   touched once the write succeeded
//!
//! Cache failures never fail an operation.

mod entity;
mod primary;

pub use entity::CachedEntityRepository;
pub use primary::CachedPrimaryEntityRepository;
