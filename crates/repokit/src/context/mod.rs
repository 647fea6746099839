//! Units of work over a store.
//!
//! A [`Database`] is the shareable handle: a store plus the model it serves.
//! Each logical operation opens a [`DbContext`] from it, which owns the
//! change tracker (and with it the local snapshot of in-flight entities) and
//! builds lazy [`Query`] values.

mod database;
mod query;
mod tracker;

pub use database::{ContextId, Database, DbContext};
pub use query::{Query, ScalarQuery};
pub use tracker::EntityState;
