//! SQLite store.
//!
//! Uses `rusqlite` for synchronous operations and `tokio-rusqlite` for async
//! wrapping. Each entity table holds `(key, data)` rows with `data` as JSON
//! text; indexes are expression indexes over `json_extract`.

mod conversions;
mod error;
mod schema;
mod store;

pub use store::SqliteStore;
