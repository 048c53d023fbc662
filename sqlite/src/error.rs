//! Error types for SQLite run storage.

use thiserror::Error;

/// Errors that can occur while storing or loading runs.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),

    /// Warnings column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A stored value could not be turned back into its typed form.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Requested run does not exist.
    #[error("run not found: {0}")]
    NotFound(String),

    /// The run failed validation and was not stored.
    #[error("run validation failed: {0}")]
    ValidationError(String),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
