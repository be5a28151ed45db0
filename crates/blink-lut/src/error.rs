//! Color table error types.

use thiserror::Error;

/// Result type for color table operations.
pub type LutResult<T> = Result<T, LutError>;

/// Errors that can occur while building or loading color tables.
#[derive(Debug, Error)]
pub enum LutError {
    /// Table has an unusable number of entries.
    #[error("invalid table size: {0}")]
    InvalidSize(String),

    /// Parse error in a custom table.
    #[error("parse error at line {line}: {message}")]
    ParseError {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// No table with this name.
    #[error("unknown color table '{0}'")]
    UnknownTable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LutError {
    /// Creates a [`LutError::ParseError`].
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }
}
