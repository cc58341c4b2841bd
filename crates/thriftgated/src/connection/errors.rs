//! Error types for opening and using upstream connections.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use thriftgate_codec::{ApplicationException, CodecError};

/// Errors raised while opening a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The host name did not resolve.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        /// Remote host.
        host: String,
        /// Remote port.
        port: u16,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },
    /// The host name resolved to no addresses.
    #[error("no addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Remote host.
        host: String,
        /// Remote port.
        port: u16,
    },
    /// Every resolved address refused or timed out.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Last address tried.
        addr: SocketAddr,
        /// Connect failure.
        #[source]
        source: io::Error,
    },
    /// Socket options could not be applied.
    #[error("failed to configure connection to {addr}: {source}")]
    Configure {
        /// Connected address.
        addr: SocketAddr,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

/// Errors raised by a call on an open connection.
#[derive(Debug, Error)]
pub enum CallError {
    /// The remote side answered with an application exception.
    #[error("remote application exception: {0}")]
    Application(ApplicationException),
    /// Reading or writing the connection failed.
    #[error("transport failure: {0}")]
    Transport(#[from] thrift::Error),
    /// The reply did not belong to the call.
    #[error("unexpected reply: {message}")]
    Protocol {
        /// What did not match.
        message: String,
    },
    /// Arguments or results did not fit the schema.
    #[error("conversion failure: {0}")]
    Codec(CodecError),
}

impl From<CodecError> for CallError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::Wire(wire) => Self::Transport(wire),
            other => Self::Codec(other),
        }
    }
}
