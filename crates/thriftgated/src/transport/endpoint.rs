//! Binding of front-end endpoints.
//!
//! A Unix socket file left behind by a previous run is replaced only when
//! connecting to it is refused or finds nothing; any other connect failure
//! leaves the file in place and fails the bind.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use thriftgate_config::SocketEndpoint;

use super::{BindError, ConnectionStream};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

#[cfg(unix)]
use camino::Utf8PathBuf;
#[cfg(unix)]
use tracing::warn;

#[cfg(unix)]
use super::LISTENER_TARGET;

/// A bound, not yet accepting, front-end socket.
#[derive(Debug)]
pub(crate) enum BoundEndpoint {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: UnixListener,
        path: Utf8PathBuf,
    },
}

impl BoundEndpoint {
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, BindError> {
        match endpoint {
            SocketEndpoint::Tcp { host, port } => bind_tcp(host, *port).map(Self::Tcp),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => Ok(Self::Unix {
                listener: bind_unix(path.as_std_path())?,
                path: path.clone(),
            }),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(BindError::UnixUnsupported),
        }
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Self::Unix { .. } => None,
        }
    }

    pub(crate) fn set_nonblocking(&self) -> Result<(), BindError> {
        let switched = match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix { listener, .. } => listener.set_nonblocking(true),
        };
        switched.map_err(|source| BindError::NonBlocking { source })
    }

    /// Accepts one pending client as a blocking stream; `None` when nobody
    /// is waiting.
    pub(crate) fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix { listener, .. } => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Removes the socket file of a Unix endpoint.
    pub(crate) fn release(&self) {
        match self {
            Self::Tcp(_) => {}
            #[cfg(unix)]
            Self::Unix { path, .. } => {
                if let Err(error) = fs::remove_file(path)
                    && error.kind() != io::ErrorKind::NotFound
                {
                    warn!(
                        target: LISTENER_TARGET,
                        %error,
                        %path,
                        "failed to remove unix socket file"
                    );
                }
            }
        }
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, BindError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| BindError::Resolve { source })?
        .next()
        .ok_or(BindError::NoAddress)?;
    TcpListener::bind(addr).map_err(|source| BindError::Tcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, BindError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if !metadata.file_type().is_socket() => return Err(BindError::NotSocket),
        Ok(_) => clear_stale_socket(path)?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(BindError::Metadata { source }),
    }
    UnixListener::bind(path).map_err(|source| BindError::Unix { source })
}

#[cfg(unix)]
fn clear_stale_socket(path: &Path) -> Result<(), BindError> {
    match UnixStream::connect(path) {
        Ok(_live) => Err(BindError::InUse),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            fs::remove_file(path).map_err(|source| BindError::StaleCleanup { source })
        }
        Err(source) => Err(BindError::UnixConnect { source }),
    }
}
