//! Defines the unified error surface for daemon launch and supervision.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::crawler::CrawlerError;
use crate::transport::TransportError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the gateway process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the gateway failed.
    #[error("gateway bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// The front-end listener or worker pool failed.
    #[error("gateway transport failed: {source}")]
    Transport {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// The background crawler failed.
    #[error("schema crawler failed: {source}")]
    Crawler {
        /// Underlying crawler error.
        #[source]
        source: CrawlerError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<TransportError> for LaunchError {
    fn from(source: TransportError) -> Self {
        Self::Transport { source }
    }
}

impl From<CrawlerError> for LaunchError {
    fn from(source: CrawlerError) -> Self {
        Self::Crawler { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
