//! In-memory store.
//!
//! Keeps every table in a `BTreeMap` behind an `Arc<RwLock<_>>`. Data is not
//! persisted and is lost when the last handle is dropped. Besides tests and
//! development, the store is useful to observe how often a cache decorator
//! lets calls through: it counts reads and writes, and can simulate an
//! outage.
//!
//! # Example
//!
//! ```rust,ignore
//! use repokit::storage::inmemory::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! store.set_unavailable(true);
//! ```

mod store;

pub use store::InMemoryStore;
