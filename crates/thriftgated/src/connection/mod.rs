//! Upstream connections and the per-worker connection cache.
//!
//! A [`Connector`] opens [`Connection`]s; a [`ConnectionCache`] keeps one
//! open connection per [`ConnectionKey`] for the worker that owns it. The
//! cache is never shared between workers, so it needs no locking.

mod errors;
mod thrift_client;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use camino::Utf8PathBuf;
use thriftgate_codec::StructValue;
use thriftgate_idl::{MethodDescriptor, TypeTable};
use tracing::{debug, warn};

pub use self::errors::{CallError, ConnectError};
pub use self::thrift_client::{ThriftConnection, ThriftConnector};

const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Identity of a cached connection: the schema file and service it speaks,
/// and the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    /// Root-relative schema path.
    pub path: Utf8PathBuf,
    /// Service name within the schema.
    pub service: String,
    /// Remote host.
    pub host: String,
    /// Remote port.
    pub port: u16,
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}:{}@{}:{}",
            self.path, self.service, self.host, self.port
        )
    }
}

/// An open client connection to one remote service.
pub trait Connection: Send {
    /// Sends `args` as a call to `method` and returns the decoded result
    /// struct, or `None` for one-way methods.
    fn invoke(
        &mut self,
        method: &MethodDescriptor,
        args: &StructValue,
        types: &TypeTable,
    ) -> Result<Option<StructValue>, CallError>;

    /// Closes the connection.
    fn close(&mut self) -> Result<(), CallError>;
}

/// Opens connections for cache misses.
pub trait Connector: Send + Sync {
    /// Opens a connection for `key`.
    fn connect(&self, key: &ConnectionKey) -> Result<Box<dyn Connection>, ConnectError>;
}

/// Per-worker map of open connections.
pub struct ConnectionCache {
    connector: Arc<dyn Connector>,
    connections: HashMap<ConnectionKey, Box<dyn Connection>>,
}

impl ConnectionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connections: HashMap::new(),
        }
    }

    /// Returns the cached connection for `key`, opening and storing one on a
    /// miss. A failed open leaves the cache unchanged.
    pub fn get(&mut self, key: &ConnectionKey) -> Result<&mut dyn Connection, ConnectError> {
        match self.connections.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_mut()),
            Entry::Vacant(entry) => {
                let connection = self.connector.connect(key)?;
                debug!(target: CONNECTION_TARGET, %key, "connection opened");
                Ok(entry.insert(connection).as_mut())
            }
        }
    }

    /// Closes and forgets the connection for `key`. Close failures are
    /// logged; the entry is removed regardless. Returns whether an entry
    /// existed.
    pub fn evict(&mut self, key: &ConnectionKey) -> bool {
        let Some(mut connection) = self.connections.remove(key) else {
            return false;
        };
        if let Err(error) = connection.close() {
            warn!(target: CONNECTION_TARGET, %key, %error, "failed to close connection");
        }
        debug!(target: CONNECTION_TARGET, %key, "connection evicted");
        true
    }

    /// Closes every cached connection and returns how many there were.
    pub fn close_all(&mut self) -> usize {
        let keys: Vec<ConnectionKey> = self.connections.keys().cloned().collect();
        keys.iter().filter(|key| self.evict(key)).count()
    }

    /// Whether a connection for `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.connections.contains_key(key)
    }

    /// Number of cached connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
