//! Cache backends and the broker repositories talk to.
//!
//! The in-memory backend is always available; Redis is selected via feature
//! flag. Both implement `repokit_core::cache::Cache` and can be mixed freely:
//! every decorator is generic over its cache.
//!
//! # Feature Flags
//!
//! - `redis`: Redis cache using the redis crate

mod broker;
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

pub use broker::{CacheBroker, CacheEntryOptions};
pub use memory::MemoryCache;

#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;
