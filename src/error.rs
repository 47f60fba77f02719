//! Error types for counting runs and table files.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected configuration, surfaced before any accumulation starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A word must contain at least one symbol.
    #[error("word length must be at least 1")]
    WordLengthZero,
    /// The word does not fit a 32-bit value.
    #[error("word length {k} exceeds the maximum of {max} for 32-bit words")]
    WordLengthTooLarge { k: usize, max: usize },
    /// Keeping zero-count rows means materializing the whole word space.
    #[error("word length {k} is too large to keep zero-count rows (limit {max})")]
    KeepZeroTooLarge { k: usize, max: usize },
    /// The worker pool cannot be empty.
    #[error("at least one counting thread is required")]
    NoThreads,
}

/// Errors reported by the library.
///
/// Internal-consistency violations in the merge bookkeeping are not
/// represented here: they indicate a coordination bug, and the run aborts
/// with a panic carrying a diagnostic instead of returning.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no column {index} in a table with {columns} column(s)")]
    NoSuchColumn { index: usize, columns: usize },

    #[error("invalid table file {}: {reason}", .path.display())]
    InvalidTable { path: PathBuf, reason: String },

    #[error("table encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("table decoding failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
