//! Error types for mediasplice-chapters.

use std::io;
use thiserror::Error;

/// Result type for chapter operations.
pub type Result<T> = std::result::Result<T, ChapterError>;

/// Errors raised while reading chapter files.
///
/// Editing operations on an existing tree never fail.
#[derive(Debug, Error)]
pub enum ChapterError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line did not match the expected syntax.
    #[error("Simple chapter parser: line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A chapter format that is recognised but not handled here.
    #[error("Unsupported chapter format: {0}")]
    UnsupportedFormat(String),

    /// The text does not contain a supported chapter format.
    #[error("Unknown chapter file format. It does not contain a supported chapter format.")]
    UnknownFormat,

    /// Internal pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ChapterError {
    /// Create a parse error for a 1-based line number.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
