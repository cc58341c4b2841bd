//! Supervises gateway launch sequencing and runtime orchestration.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::bootstrap::{ConfigLoader, Daemon, SystemConfigLoader, bootstrap_with};
use crate::connection::{Connector, ThriftConnector};
use crate::crawler::CrawlerHandle;
use crate::dispatch::GatewayConnectionHandler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{ListenerHandle, SocketListener, WorkerPool};

use super::errors::LaunchError;
use super::shutdown::{ShutdownCause, ShutdownSignal, SystemShutdownSignal};
use super::PROCESS_TARGET;

/// The background threads serving one bootstrapped gateway.
pub struct RunningGateway {
    local_addr: Option<SocketAddr>,
    listener: ListenerHandle,
    workers: WorkerPool,
    crawler: CrawlerHandle,
}

impl RunningGateway {
    /// Binds the configured endpoint and starts the listener, the worker
    /// pool, and the schema crawler. Upstream connections are opened with
    /// `connector`.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] when binding or spawning fails.
    pub fn start(daemon: &Daemon, connector: Arc<dyn Connector>) -> Result<Self, LaunchError> {
        let config = daemon.config();
        let listener = SocketListener::bind(config.listen_socket())?;
        let local_addr = listener.local_addr();
        let handler = Arc::new(GatewayConnectionHandler::new(Arc::clone(daemon.gateway())));
        let (workers, queue) = WorkerPool::start(config.workers(), handler, connector)?;
        let crawler = CrawlerHandle::spawn(
            Arc::clone(daemon.gateway().monitor()),
            config.rescan_interval(),
        )?;
        let listener = listener.start(queue)?;
        info!(
            target: PROCESS_TARGET,
            socket = %config.listen_socket(),
            workers = workers.len(),
            "gateway ready"
        );
        Ok(Self {
            local_addr,
            listener,
            workers,
            crawler,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stops accepting, lets the workers drain the queue, and stops the
    /// crawler.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] when one of the threads panicked.
    pub fn stop(self) -> Result<(), LaunchError> {
        let Self {
            listener,
            workers,
            crawler,
            ..
        } = self;
        listener.shutdown();
        listener.join()?;
        workers.join()?;
        crawler.join()?;
        info!(target: PROCESS_TARGET, "shutdown sequence completed");
        Ok(())
    }
}

/// Runs the gateway using the production collaborators until a termination
/// signal arrives.
///
/// # Errors
///
/// Returns a [`LaunchError`] when bootstrap, startup, or shutdown fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        &SystemShutdownSignal::new(),
    )
}

/// Runs the gateway with injected collaborators.
///
/// # Errors
///
/// Returns a [`LaunchError`] when bootstrap, startup, or shutdown fails.
pub fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    info!(target: PROCESS_TARGET, "starting gateway runtime");
    let daemon = bootstrap_with(loader, reporter)?;
    let config = daemon.config();
    let connector = Arc::new(ThriftConnector::new(
        config.connect_timeout(),
        config.call_timeout(),
    ));
    let running = RunningGateway::start(&daemon, connector)?;
    match shutdown.wait()? {
        ShutdownCause::Signal(signal) => {
            info!(target: PROCESS_TARGET, signal, "shutdown signal received");
        }
        ShutdownCause::Requested => info!(target: PROCESS_TARGET, "shutdown requested"),
    }
    running.stop()
}
