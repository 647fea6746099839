//! Store implementations.
//!
//! This module provides concrete implementations of the
//! `repokit_core::storage::Store` trait. The in-memory store is always
//! available; the SQLite store is selected via feature flag.
//!
//! # Feature Flags
//!
//! - `sqlite` (default): SQLite store using `rusqlite` and `tokio-rusqlite`
//!
//! # Examples
//!
//! Build with SQLite (default):
//! ```bash
//! cargo build -p repokit
//! ```
//!
//! Build without it (in-memory store only):
//! ```bash
//! cargo build -p repokit --no-default-features
//! ```

pub mod inmemory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use inmemory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
