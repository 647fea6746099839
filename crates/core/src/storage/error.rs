use thiserror::Error;

/// Errors that can occur during repository and store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl RepositoryError {
    /// True for errors raised by the store itself (constraints, connectivity,
    /// query execution), as opposed to caller or encoding mistakes.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            RepositoryError::AlreadyExists { .. }
                | RepositoryError::ConnectionFailed(_)
                | RepositoryError::QueryFailed(_)
        )
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
