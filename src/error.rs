//! Centralized error types for mbox2csv.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mbox2csv library.
#[derive(Error, Debug)]
pub enum MboxError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified archive does not exist.
    #[error("{0} does not exist")]
    FileNotFound(PathBuf),

    /// A header of the message starting at `offset` could not be parsed.
    #[error("Parse error at offset {offset}: {reason}")]
    ParseError { offset: u64, reason: String },

    /// A MIME decoding error.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// The MIME part tree is nested deeper than the walker allows.
    #[error("MIME structure nested deeper than {0} levels")]
    NestingTooDeep(usize),

    /// Writing a CSV record failed.
    #[error("CSV error writing '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

/// Convenience alias for `Result<T, MboxError>`.
pub type Result<T> = std::result::Result<T, MboxError>;

impl MboxError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Csv` variant from a path and a `csv::Error`.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}
