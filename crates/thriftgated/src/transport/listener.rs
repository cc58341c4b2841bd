//! Accept loop feeding the worker queue.
//!
//! The listener owns the bound socket and a [`Sender`] into the worker
//! pool. Accepted streams are handed to the pool over a bounded channel; when
//! every worker is busy and the queue is full the listener stops accepting
//! until a slot frees up, so clients wait in the kernel backlog instead of in
//! memory.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};
use thriftgate_config::SocketEndpoint;
use tracing::{debug, info, warn};

use super::endpoint::BoundEndpoint;
use super::{ConnectionStream, LISTENER_TARGET, TransportError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const HANDOFF_POLL: Duration = Duration::from_millis(50);

/// A bound front-end socket, ready to start accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    bound: BoundEndpoint,
}

impl SocketListener {
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, TransportError> {
        let bound = BoundEndpoint::bind(endpoint).map_err(|source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Self {
            endpoint: endpoint.clone(),
            bound,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.local_addr()
    }

    /// Spawns the accept loop. Dropping the returned handle, or calling
    /// [`ListenerHandle::shutdown`], ends it; the queue sender goes with it,
    /// which lets the workers drain and exit.
    pub(crate) fn start(
        self,
        queue: Sender<ConnectionStream>,
    ) -> Result<ListenerHandle, TransportError> {
        if let Err(source) = self.bound.set_nonblocking() {
            self.bound.release();
            return Err(TransportError::Bind {
                endpoint: self.endpoint.to_string(),
                source,
            });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("thriftgate-listener".to_owned())
            .spawn(move || self.serve(&flag, &queue))
            .map_err(|source| TransportError::Spawn {
                role: "listener",
                source,
            })?;
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }

    fn serve(self, shutdown: &AtomicBool, queue: &Sender<ConnectionStream>) {
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "socket listener active");
        let mut last_error = None::<io::ErrorKind>;
        while !shutdown.load(Ordering::SeqCst) {
            match self.bound.accept() {
                Ok(Some(stream)) => {
                    last_error = None;
                    if hand_off(stream, queue, shutdown) == Handoff::PoolGone {
                        warn!(target: LISTENER_TARGET, "worker pool is gone; stopping listener");
                        break;
                    }
                }
                Ok(None) => thread::sleep(ACCEPT_BACKOFF),
                Err(error) => {
                    if last_error != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, %error, "socket accept error");
                    }
                    last_error = Some(error.kind());
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        self.bound.release();
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "socket listener stopped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handoff {
    Queued,
    /// Shutdown began while the queue was full; the stream was closed.
    Dropped,
    PoolGone,
}

/// Queues `stream` for the workers, waiting while the queue is full.
fn hand_off(
    mut stream: ConnectionStream,
    queue: &Sender<ConnectionStream>,
    shutdown: &AtomicBool,
) -> Handoff {
    let mut reported = false;
    loop {
        match queue.send_timeout(stream, HANDOFF_POLL) {
            Ok(()) => return Handoff::Queued,
            Err(SendTimeoutError::Disconnected(_)) => return Handoff::PoolGone,
            Err(SendTimeoutError::Timeout(pending)) => {
                if shutdown.load(Ordering::SeqCst) {
                    debug!(target: LISTENER_TARGET, "closing a queued client at shutdown");
                    return Handoff::Dropped;
                }
                if !reported {
                    debug!(target: LISTENER_TARGET, "worker queue full; holding client");
                    reported = true;
                }
                stream = pending;
            }
        }
    }
}

/// Handle to the background accept loop.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub(crate) fn join(mut self) -> Result<(), TransportError> {
        self.handle
            .take()
            .map_or(Ok(()), |handle| handle.join().map_err(|_| TransportError::ListenerPanic))
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
