use std::path::PathBuf;

use thiserror::Error;

/// Outcome of reading a source file that did not yield a usable document.
///
/// Every variant is retry-safe: the caller drops the notification and waits
/// for the next one, leaving the previous destination document in place.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("source file {} does not exist yet", .0.display())]
    NotReady(PathBuf),
    #[error("source file {} is empty", .0.display())]
    Empty(PathBuf),
    #[error("source file {} is not valid JSON: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("malformed achievements document: expected a JSON object, found {0}")]
    MalformedInput(&'static str),
    #[error("failed to watch {}: {reason}", .directory.display())]
    Subscription { directory: PathBuf, reason: String },
    #[error("process query failed: {0}")]
    ProcessQuery(String),
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Transient states that simply mean "try again on the next notification".
    pub fn is_transient(&self) -> bool {
        matches!(self, ReadError::NotReady(_) | ReadError::Empty(_))
    }
}
