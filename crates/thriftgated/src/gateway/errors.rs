//! Errors surfaced by gateway operations.

use thiserror::Error;
use thriftgate_codec::CodecError;

/// Failures of [`super::Gateway`] operations that are not reported as
/// exception payloads.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The file, service, or method is not indexed.
    #[error("{message}")]
    NotFound {
        /// What was missing.
        message: String,
    },
    /// More than one service matched the request.
    #[error("method '{method}' is ambiguous between {}", .candidates.join(", "))]
    Ambiguous {
        /// Requested method.
        method: String,
        /// Matching `path:service` pairs.
        candidates: Vec<String>,
    },
    /// A sample or listing could not be rendered.
    #[error(transparent)]
    Conversion(#[from] CodecError),
}

impl GatewayError {
    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Whether the error is the distinguishable not-found signal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
