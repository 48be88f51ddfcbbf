//! Error types for the directory layer.

use kvdir_engine::EngineError;
use thiserror::Error;

/// Result type for directory operations.
pub type DirResult<T> = Result<T, DirError>;

/// Errors that can occur in the directory layer.
#[derive(Debug, Error)]
pub enum DirError {
    /// A failure surfaced by the underlying key-value engine.
    #[error("storage engine error: {0}")]
    Engine(#[from] EngineError),

    /// No file record exists for the requested name.
    #[error("file not found: {name}")]
    FileNotFound {
        /// The requested file name.
        name: String,
    },

    /// Operation attempted on a closed directory store or channel.
    #[error("directory store is closed")]
    Closed,

    /// Stored state contradicts a file record's declared metadata.
    #[error("corruption in file {name}: {detail}")]
    Corruption {
        /// The affected file name (or store name for index-level damage).
        name: String,
        /// Description of the inconsistency.
        detail: String,
    },

    /// File name does not fit the block-key encoding.
    #[error("file name too long: {length} bytes (limit {limit})")]
    NameTooLong {
        /// Byte length of the rejected name.
        length: usize,
        /// Maximum supported byte length.
        limit: usize,
    },

    /// A read advanced past the recorded file length.
    #[error("read past end of file {name}: position {position}, length {length}")]
    EndOfFile {
        /// The file being read.
        name: String,
        /// Cursor position at the time of the read.
        position: u64,
        /// Recorded file length.
        length: u64,
    },
}

impl DirError {
    /// Creates a corruption error.
    pub fn corruption(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Corruption {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Creates a file-not-found error.
    pub fn file_not_found(name: impl Into<String>) -> Self {
        Self::FileNotFound { name: name.into() }
    }
}
