//! Error taxonomy shared by every storage backend.
//!
//! Absence of an entity is never an error: lookups return `Ok(None)`.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A natural key or per-session event uuid is already taken.
    #[error("duplicate {0}")]
    Duplicate(String),

    /// Input rejected before any write happened.
    #[error("invalid {0}")]
    Validation(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    #[cfg(feature = "document")]
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[cfg(feature = "widecolumn")]
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Corrupt stored data, lost worker tasks and other backend failures.
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("operation timed out")]
    Timeout,
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate(_))
    }

    pub(crate) fn corrupt(what: impl std::fmt::Display) -> Self {
        StoreError::Backend(format!("malformed stored data: {}", what))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Backend(format!("storage worker failed: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for StoreError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        StoreError::Timeout
    }
}

#[cfg(feature = "document")]
impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        StoreError::Backend(format!("bson encoding failed: {}", err))
    }
}

#[cfg(feature = "document")]
impl From<mongodb::bson::de::Error> for StoreError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        StoreError::corrupt(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_detection() {
        assert!(StoreError::Duplicate("event uuid".into()).is_duplicate());
        assert!(!StoreError::Validation("status".into()).is_duplicate());
        assert!(!StoreError::Timeout.is_duplicate());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Duplicate("user email a@b.c".to_string());
        assert_eq!(err.to_string(), "duplicate user email a@b.c");

        let err = StoreError::Validation("plan status: shipped".to_string());
        assert_eq!(err.to_string(), "invalid plan status: shipped");
    }
}
