//! Error types for collection file access.

use thiserror::Error;

/// Errors that can occur while reading or writing a collection file.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// The `col.models` or `col.decks` JSON could not be parsed or written.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A cell or frame could not be converted to or from SQL rows.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// The file is not an Anki collection.
    #[error("invalid collection: {0}")]
    InvalidCollection(String),
}

impl From<SqliteError> for ankiframe_core::Error {
    fn from(err: SqliteError) -> Self {
        ankiframe_core::Error::storage(err)
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
