//! Error types for document parsing.
//!
//! Absence of a section, field, or module is never an error; these variants
//! cover only documents that cannot be read or recognized at all.

use std::path::PathBuf;

use thiserror::Error;

/// Hard failures for a single source document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document has no non-blank content.
    #[error("document '{0}' is empty")]
    Empty(String),

    /// The document looks like JSON but does not decode.
    #[error("invalid JSON in '{file}': {source}")]
    InvalidJson {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// Neither section markers, header fields, nor a JSON object were found.
    #[error("unrecognized document format in '{0}'")]
    Unrecognized(String),

    /// The source file could not be read.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid or missing batch input (e.g. a path that does not exist).
    #[error("{0}")]
    InvalidInput(String),
}

/// Convenience alias for results with [`ParseError`].
pub type Result<T> = std::result::Result<T, ParseError>;
