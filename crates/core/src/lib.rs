//! Core types for the repokit data-access layer.
//!
//! Everything in this crate is pure: capability traits for entities, stores and
//! caches, query and command options, filter expressions, and model/migration
//! planning. The I/O side lives in the `repokit` crate.

pub mod cache;
pub mod entity;
pub mod model;
pub mod options;
pub mod query;
pub mod storage;
