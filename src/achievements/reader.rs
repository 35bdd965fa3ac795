use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::error::ReadError;

/// Reads a source file only after giving its writer a moment to finish.
///
/// The settle delay narrows, but does not close, the window in which a partial
/// write can be observed. `Corrupt` results are expected now and then and are
/// simply retried on the next notification.
#[derive(Debug, Clone, Copy)]
pub struct StableFileReader {
    settle_delay: Duration,
}

impl StableFileReader {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    pub async fn read_stable(&self, path: &Path) -> Result<Value, ReadError> {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        read_now(path).await
    }
}

async fn read_now(path: &Path) -> Result<Value, ReadError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ReadError::NotReady(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ReadError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if bytes.is_empty() {
        return Err(ReadError::Empty(path.to_path_buf()));
    }

    serde_json::from_slice(&bytes).map_err(|source| ReadError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}
