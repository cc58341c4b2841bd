//! Shared harness pieces for unit and behavioural suites.

use std::ffi::OsString;
use std::fs;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;
use thriftgate_config::{Config, SocketEndpoint};
use thriftgate_idl::{IdlError, SchemaLoader};

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::crawler::FileMonitor;
use crate::gateway::Gateway;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::index::SchemaIndex;

/// A temporary schema root.
pub struct SchemaTree {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl SchemaTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 root");
        Self { _dir: dir, root }
    }

    /// Writes `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write schema");
    }

    /// Root directory of the tree.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// A gateway over the files written so far, with the tree scanned but
    /// nothing indexed yet.
    pub fn gateway(&self) -> Arc<Gateway> {
        let monitor = FileMonitor::new(self.root.clone(), "*.thrift").expect("monitor");
        let index = SchemaIndex::new(
            SchemaLoader::default(),
            self.root.clone(),
            Arc::new(StructuredHealthReporter::new()),
        );
        let gateway = Gateway::new(Arc::new(monitor), Arc::new(index));
        gateway.monitor().refresh();
        Arc::new(gateway)
    }

    /// Configuration serving this tree on an ephemeral loopback port.
    pub fn config(&self) -> Config {
        Config {
            listen_socket: SocketEndpoint::tcp("127.0.0.1", 0),
            schema_root: self.root.clone(),
            rescan_interval_ms: 50,
            workers: 2,
            connect_timeout_ms: 1_000,
            call_timeout_ms: 2_000,
            ..Config::default()
        }
    }
}

impl Default for SchemaTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Loader that fails by passing a non-numeric worker count.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(vec![
            OsString::from("thriftgated"),
            OsString::from("--workers"),
            OsString::from("many"),
        ])
    }
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn schema_indexed(&self, path: &Utf8Path, services: usize) {
        self.record(HealthEvent::SchemaIndexed {
            path: path.to_string(),
            services,
        });
    }

    fn schema_rejected(&self, path: &Utf8Path, _error: &IdlError) {
        self.record(HealthEvent::SchemaRejected(path.to_string()));
    }
}

/// Structured health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// A schema file was indexed.
    SchemaIndexed {
        /// Root-relative path.
        path: String,
        /// Number of services declared.
        services: usize,
    },
    /// A schema file failed to parse.
    SchemaRejected(String),
}
