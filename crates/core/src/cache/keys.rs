use std::fmt::Display;

/// Returns the cache key for a primary-keyed entity: `"{table}:{id}"`.
pub fn entity_key(table: &str, id: impl Display) -> String {
    format!("{}:{}", table, id)
}
