//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `RepositoryError`.
//! Constraint failures become semantic variants (a duplicate key or unique
//! index hit is `AlreadyExists`).

use repokit_core::storage::RepositoryError;

/// Maps a rusqlite error to a RepositoryError.
///
/// # Error Mapping
///
/// - `SQLITE_CONSTRAINT_UNIQUE` / `SQLITE_CONSTRAINT_PRIMARYKEY` → `AlreadyExists`
/// - `SQLITE_CONSTRAINT_CHECK` → `InvalidData`
/// - Open and busy errors → `ConnectionFailed`
/// - All other errors → `QueryFailed`
fn map_rusqlite_error(err: &rusqlite::Error, entity_type: &'static str) -> RepositoryError {
    map_rusqlite_error_with_id(err, entity_type, "unknown")
}

pub(crate) fn map_rusqlite_error_with_id(
    err: &rusqlite::Error,
    entity_type: &'static str,
    id: &str,
) -> RepositoryError {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            RepositoryError::AlreadyExists {
                entity_type,
                id: id.to_string(),
            }
        }

        // The data column only accepts valid JSON
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_CHECK =>
        {
            RepositoryError::InvalidData(format!("Invalid document for {entity_type}: {id}"))
        }

        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if matches!(
                sqlite_err.code,
                rusqlite::ErrorCode::CannotOpen | rusqlite::ErrorCode::DatabaseBusy
            ) =>
        {
            RepositoryError::ConnectionFailed(err.to_string())
        }

        rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
            entity_type,
            id: id.to_string(),
        },

        rusqlite::Error::FromSqlConversionFailure(..) => {
            RepositoryError::Serialization(err.to_string())
        }

        _ => RepositoryError::QueryFailed(err.to_string()),
    }
}

/// Maps a tokio_rusqlite error to a RepositoryError.
///
/// This is the main entry point for error mapping in async code. Errors
/// raised inside a `call` closure as `Other(RepositoryError)` pass through
/// unchanged.
pub fn map_tokio_rusqlite_error(
    err: tokio_rusqlite::Error,
    entity_type: &'static str,
) -> RepositoryError {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite_err) => {
            map_rusqlite_error(&rusqlite_err, entity_type)
        }
        tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_) => {
            RepositoryError::ConnectionFailed("Connection closed unexpectedly".to_string())
        }
        tokio_rusqlite::Error::Other(other) => match other.downcast::<RepositoryError>() {
            Ok(repository_err) => *repository_err,
            Err(other) => RepositoryError::QueryFailed(other.to_string()),
        },
        other => RepositoryError::QueryFailed(other.to_string()),
    }
}

/// Carries a `RepositoryError` out of a `call` closure.
pub(crate) fn raise(err: RepositoryError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn constraint(extended_code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code,
            },
            None,
        )
    }

    #[test]
    fn test_unique_constraint_maps_to_already_exists() {
        let err = tokio_rusqlite::Error::Rusqlite(constraint(ffi::SQLITE_CONSTRAINT_UNIQUE));

        let result = map_tokio_rusqlite_error(err, "products");

        assert!(matches!(
            result,
            RepositoryError::AlreadyExists {
                entity_type: "products",
                ..
            }
        ));
    }

    #[test]
    fn test_primary_key_with_id_preserves_id() {
        let result = map_rusqlite_error_with_id(
            &constraint(ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
            "products",
            "abc-123",
        );

        match result {
            RepositoryError::AlreadyExists { entity_type, id } => {
                assert_eq!(entity_type, "products");
                assert_eq!(id, "abc-123");
            }
            _ => panic!("Expected AlreadyExists error"),
        }
    }

    #[test]
    fn test_check_constraint_maps_to_invalid_data() {
        let result = map_rusqlite_error(&constraint(ffi::SQLITE_CONSTRAINT_CHECK), "products");
        assert!(matches!(result, RepositoryError::InvalidData(_)));
    }

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err = tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows);

        let result = map_tokio_rusqlite_error(err, "products");

        assert!(matches!(
            result,
            RepositoryError::NotFound {
                entity_type: "products",
                ..
            }
        ));
    }

    #[test]
    fn test_raised_repository_error_passes_through() {
        let raised = raise(RepositoryError::NotFound {
            entity_type: "products",
            id: "abc".to_string(),
        });

        let result = map_tokio_rusqlite_error(raised, "ignored");

        assert_eq!(
            result,
            RepositoryError::NotFound {
                entity_type: "products",
                id: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_other_error_maps_to_query_failed() {
        let err = tokio_rusqlite::Error::Other(Box::new(std::io::Error::other("test error")));

        let result = map_tokio_rusqlite_error(err, "products");

        assert!(matches!(result, RepositoryError::QueryFailed(_)));
    }
}
