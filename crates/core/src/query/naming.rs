use crate::storage::{RepositoryError, Result};

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates a table or index name.
pub fn validate_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(RepositoryError::InvalidData(format!(
            "Invalid identifier: {name:?}"
        )))
    }
}

/// Validates a dotted document field path such as `"address.city"`.
pub fn validate_field(field: &str) -> Result<()> {
    if !field.is_empty() && field.split('.').all(is_identifier) {
        Ok(())
    } else {
        Err(RepositoryError::InvalidData(format!(
            "Invalid field path: {field:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("products").is_ok());
        assert!(validate_identifier("_audit_2024").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("9lives").is_err());
        assert!(validate_identifier("drop table").is_err());
        assert!(validate_identifier("a\"b").is_err());
    }

    #[test]
    fn test_field_paths() {
        assert!(validate_field("address.city").is_ok());
        assert!(validate_field("address..city").is_err());
        assert!(validate_field("address.").is_err());
        assert!(validate_field("$.name").is_err());
    }
}
