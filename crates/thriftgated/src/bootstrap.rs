//! Gateway bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use thriftgate_config::{Config, SocketPreparationError};
use thriftgate_idl::SchemaLoader;

use crate::crawler::{CrawlerError, FileMonitor};
use crate::gateway::Gateway;
use crate::health::HealthReporter;
use crate::index::SchemaIndex;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the gateway configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out an already resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The schema file monitor could not be built.
    #[error("failed to set up schema discovery: {source}")]
    Crawler {
        /// Underlying monitor error.
        #[source]
        source: CrawlerError,
    },
}

/// Result of a successful bootstrap: configuration plus the shared gateway
/// with the initial schema tree already indexed.
pub struct Daemon {
    config: Config,
    gateway: Arc<Gateway>,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Shared gateway state.
    #[must_use]
    pub const fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Bootstraps the gateway using the supplied collaborators.
///
/// # Errors
///
/// Returns a [`BootstrapError`] describing the first failed stage; the
/// reporter has already been told about it.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match build(loader, &reporter) {
        Ok(daemon) => {
            reporter.bootstrap_succeeded(&daemon.config);
            Ok(daemon)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn build(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .listen_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    let monitor = FileMonitor::new(config.schema_root(), config.schema_pattern())
        .map_err(|source| BootstrapError::Crawler { source })?;
    let loader = SchemaLoader::new(config.include_dirs().iter().map(|dir| dir.as_std_path()));
    let index = SchemaIndex::new(loader, config.schema_root(), Arc::clone(reporter));
    let gateway = Arc::new(Gateway::new(Arc::new(monitor), Arc::new(index)));
    gateway.monitor().refresh();
    gateway.refresh_all();

    Ok(Daemon {
        config,
        gateway,
        telemetry,
    })
}
