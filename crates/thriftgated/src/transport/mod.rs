//! Socket listener and worker pool for the JSONL front-end.
//!
//! The listener thread accepts connections and queues them on a channel; a
//! fixed set of workers drains the channel, each owning a
//! [`WorkerContext`] with its own upstream connection cache.

mod endpoint;
mod errors;
mod handler;
mod listener;
mod pool;
#[cfg(test)]
mod tests;

pub(crate) use self::errors::{BindError, TransportError};
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::{ListenerHandle, SocketListener};
pub(crate) use self::pool::{WorkerContext, WorkerPool};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
