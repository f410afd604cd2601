//! Error types for mediasplice-demux.

use std::io;
use thiserror::Error;

/// Result type for mediasplice-demux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mediasplice-demux operations.
///
/// Only structural problems surface here. Per-track classification failures
/// and lost synchronisation are handled inside the demuxers and never reach
/// the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No demuxer recognised the input.
    #[error("Unknown file format")]
    UnknownFormat,

    /// Structurally invalid file.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The TTA seek table does not add up to the payload size.
    #[error("The seek table in this TTA file seems to be broken (sum {sum}, expected {expected})")]
    BrokenSeekTable { sum: u64, expected: u64 },

    /// Scrambled PES payloads were found.
    #[error("Reading encrypted VOBs is not supported")]
    Encrypted,

    /// Track index out of range.
    #[error("Invalid track index: {index} (tracks: {count})")]
    InvalidTrack { index: usize, count: usize },
}

impl Error {
    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Whether the error must abort the whole open/read operation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
