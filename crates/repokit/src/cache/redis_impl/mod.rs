//! Redis cache backend.
//!
//! Provides a distributed cache using Redis for multi-instance deployments.

mod cache;
mod error;

pub use cache::RedisCache;
