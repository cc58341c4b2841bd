//! Errors raised while reading a request line or writing the answer.

use std::io;

use thiserror::Error;

/// A request the gateway refuses to serve. The display text is sent back
/// to the client in an `error` line.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The line is empty or not JSON.
    #[error("malformed JSONL: {0}")]
    Malformed(String),
    /// The JSON does not fit the named operation.
    #[error("invalid request structure: {0}")]
    Structure(String),
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("request too large: {size} bytes exceeds {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

impl RequestError {
    pub(crate) fn structure(error: impl ToString) -> Self {
        Self::Structure(error.to_string())
    }
}

/// Failures while talking to one client.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}
