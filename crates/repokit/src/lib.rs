//! Generic repositories over a unit of work.
//!
//! - [`context`]: `Database` handles and the `DbContext` unit of work with its
//!   change tracker and lazy queries
//! - [`repository`]: CRUD traits, their base implementations and the cached
//!   decorators
//! - [`cache`]: cache backends and the fail-open [`cache::CacheBroker`]
//! - [`storage`]: in-memory and SQLite stores
//! - [`migrations`]: applies planned schema steps per named database
//!
//! Pure types (entity traits, filters, options, model building) live in
//! `repokit_core`.

pub mod cache;
pub mod config;
pub mod context;
pub mod migrations;
pub mod repository;
pub mod storage;
