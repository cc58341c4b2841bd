//! Waiting for the request to stop serving.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;

/// Signals that end the foreground process.
const TERMINATING_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Why serving stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// A terminating signal arrived.
    Signal(i32),
    /// The notification source closed without a signal, or a caller asked
    /// directly.
    Requested,
}

/// Source of the shutdown notification.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until the gateway should stop.
    ///
    /// # Errors
    ///
    /// Returns a [`ShutdownError`] when the source cannot be set up.
    fn wait(&self) -> Result<ShutdownCause, ShutdownError>;
}

/// Errors reported while setting up a shutdown source.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("failed to install signal handlers: {source}")]
    Install {
        #[source]
        source: io::Error,
    },
}

/// Waits for `SIGTERM`, `SIGINT`, `SIGQUIT`, or `SIGHUP`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<ShutdownCause, ShutdownError> {
        let mut signals =
            Signals::new(TERMINATING_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        Ok(signals
            .forever()
            .next()
            .map_or(ShutdownCause::Requested, ShutdownCause::Signal))
    }
}
