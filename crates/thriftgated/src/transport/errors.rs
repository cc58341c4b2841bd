//! Errors raised by the front-end transport.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Why an endpoint could not be bound.
///
/// The endpoint itself is named by the enclosing [`TransportError::Bind`].
#[derive(Debug, Error)]
pub enum BindError {
    /// Host name resolution failed.
    #[error("address resolution failed: {source}")]
    Resolve {
        #[source]
        source: io::Error,
    },
    /// The host resolved to nothing.
    #[error("the host resolved to no addresses")]
    NoAddress,
    #[error("cannot listen on {addr}: {source}")]
    Tcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The accept loop polls, so the socket must not block.
    #[error("cannot switch the listener to non-blocking mode: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[cfg(not(unix))]
    #[error("unix sockets are not available on this platform")]
    UnixUnsupported,
    #[cfg(unix)]
    #[error("cannot listen on the socket file: {source}")]
    Unix {
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("the path exists and is not a socket")]
    NotSocket,
    /// Something still answers on the existing socket file.
    #[cfg(unix)]
    #[error("another process is serving the socket")]
    InUse,
    /// Probing the existing socket failed for a reason other than a refused
    /// or vanished peer; the file is left alone.
    #[cfg(unix)]
    #[error("cannot connect to the existing socket: {source}")]
    UnixConnect {
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("cannot inspect the existing path: {source}")]
    Metadata {
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("cannot remove the stale socket: {source}")]
    StaleCleanup {
        #[source]
        source: io::Error,
    },
}

/// Errors surfaced while starting or stopping the listener and workers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured endpoint could not be bound.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        /// Endpoint as configured.
        endpoint: String,
        #[source]
        source: BindError,
    },
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        /// `listener` or `worker`.
        role: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("listener thread panicked")]
    ListenerPanic,
    #[error("{count} worker thread(s) panicked")]
    WorkerPanic { count: usize },
}
