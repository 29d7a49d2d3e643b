//! Error types for table conversion and id resolution.
//!
//! Every failure is surfaced to the caller immediately. The only local
//! recovery path is the `force` flag on the conversion operations, which
//! re-attempts a transition after an earlier one left the table
//! `in_progress`.

use thiserror::Error;

/// Errors that can occur while converting or editing an Anki table.
#[derive(Debug, Error)]
pub enum Error {
    /// Table name is not one of `notes`, `cards` or `revs`.
    #[error("invalid table kind: {0}")]
    InvalidTableKind(String),

    /// Operation attempted on a table kind or in a format it does not
    /// support, or while a previous conversion is still marked
    /// `in_progress`.
    #[error("format state error: {0}")]
    FormatState(String),

    /// A column the operation depends on is not present.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// Inserted rows do not agree with the declared model or clash with
    /// existing identifiers.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A model, deck or cross-table id could not be looked up.
    #[error("could not resolve {what} '{key}'")]
    ResolutionFailure {
        /// Kind of entity that was looked up (model, deck, card, note).
        what: &'static str,
        /// The key that had no match.
        key: String,
    },

    /// A cell could not be cast to the column's declared scalar type.
    #[error("cannot cast {value} to {target}")]
    InvalidCast {
        /// Debug rendering of the offending value.
        value: String,
        /// Target scalar type.
        target: &'static str,
    },

    /// File I/O failure while reading or writing configuration.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Failure reported by the storage collaborator.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub(crate) fn unresolved(what: &'static str, key: impl ToString) -> Self {
        Error::ResolutionFailure {
            what,
            key: key.to_string(),
        }
    }

    /// Wraps any displayable storage-layer failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
