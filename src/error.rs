//! Centralized error types for mbx2mbox.
//!
//! Only stream lifecycle failures are errors: opening the source archive,
//! creating the destination mbox, and closing either. Everything that can go
//! wrong *inside* a message (unparsable attachment lines, missing files,
//! malformed headers) degrades to a report entry and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the mbx2mbox library.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The source archive does not exist.
    #[error("mailbox archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// The destination mbox could not be created or opened.
    #[error("cannot create output mbox '{path}': {source}")]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stream could not be closed cleanly. On the output side this
    /// usually means the filesystem filled up mid-run.
    #[error("cannot close '{path}': {source} (filesystem full?)")]
    Close {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `ConvertError`
/// when no path context is available. Prefer [`ConvertError::io`].
impl From<std::io::Error> for ConvertError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
