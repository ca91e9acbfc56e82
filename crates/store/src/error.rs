use common::{Classify, ErrorKind};
use sqlx::error::ErrorKind as DbErrorKind;
use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be mapped back into a domain value.
    #[error("Corrupt record in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// The backing store is not reachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Database(e) => database_error_kind(e),
            StoreError::Migration(_) | StoreError::Unavailable(_) => ErrorKind::Transient,
            StoreError::Serialization(_) | StoreError::Corrupt { .. } => ErrorKind::Permanent,
        }
    }
}

/// Decode, mapping and constraint errors fail the same way on every retry.
fn database_error_kind(error: &sqlx::Error) -> ErrorKind {
    match error {
        sqlx::Error::Database(db) => match db.kind() {
            DbErrorKind::UniqueViolation
            | DbErrorKind::ForeignKeyViolation
            | DbErrorKind::NotNullViolation
            | DbErrorKind::CheckViolation => ErrorKind::Permanent,
            _ => ErrorKind::Transient,
        },
        sqlx::Error::Configuration(_)
        | sqlx::Error::RowNotFound
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Encode(_)
        | sqlx::Error::Decode(_) => ErrorKind::Permanent,
        _ => ErrorKind::Transient,
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
