use std::{env, time::Duration};

use repokit_core::options::TrackingMode;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file (default: "repokit.db")
    pub sqlite_path: String,
    /// Cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: u64,
    /// Maximum number of cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    pub redis_url: String,
    /// Tracking applied to queries that ask for the default (default: tracked)
    pub default_tracking: TrackingMode,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SQLITE_PATH` - SQLite database path (default: "repokit.db")
    /// - `CACHE_TTL_SECONDS` - Cache TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `DEFAULT_TRACKING` - `tracked`, `no-tracking` or
    ///   `no-tracking-with-identity-resolution` (default: "tracked")
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self {
            sqlite_path: env::var("SQLITE_PATH").unwrap_or_else(|_| "repokit.db".to_string()),
            cache_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            default_tracking: env::var("DEFAULT_TRACKING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(TrackingMode::Tracked),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_ttl_conversion() {
        let config = Config {
            sqlite_path: "test.db".to_string(),
            cache_ttl_seconds: 600,
            cache_max_entries: 10_000,
            redis_url: "redis://localhost:6379".to_string(),
            default_tracking: TrackingMode::Tracked,
        };

        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_default_values() {
        // Clear environment variables to test defaults
        env::remove_var("SQLITE_PATH");
        env::remove_var("CACHE_TTL_SECONDS");
        env::remove_var("CACHE_MAX_ENTRIES");
        env::remove_var("REDIS_URL");
        env::remove_var("DEFAULT_TRACKING");

        let config = Config::from_env();

        assert_eq!(config.sqlite_path, "repokit.db");
        assert_eq!(config.cache_ttl_seconds, 300);
        assert_eq!(config.cache_max_entries, 10_000);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.default_tracking, TrackingMode::Tracked);
    }
}
