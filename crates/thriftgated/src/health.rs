//! Structured health reporting for daemon lifecycle and schema events.

use std::sync::Arc;

use camino::Utf8Path;
use thriftgate_config::Config;
use thriftgate_idl::IdlError;

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked after a schema file was parsed and indexed.
    fn schema_indexed(&self, path: &Utf8Path, services: usize);

    /// Invoked when a schema file failed to parse and was skipped.
    fn schema_rejected(&self, path: &Utf8Path, error: &IdlError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn schema_indexed(&self, path: &Utf8Path, services: usize) {
        (**self).schema_indexed(path, services);
    }

    fn schema_rejected(&self, path: &Utf8Path, error: &IdlError) {
        (**self).schema_rejected(path, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting gateway bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.listen_socket(),
            schema_root = %config.schema_root(),
            schema_pattern = config.schema_pattern(),
            workers = config.workers(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "gateway bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "gateway bootstrap failed"
        );
    }

    fn schema_indexed(&self, path: &Utf8Path, services: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "schema_indexed",
            path = %path,
            services,
            "schema indexed"
        );
    }

    fn schema_rejected(&self, path: &Utf8Path, error: &IdlError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "schema_rejected",
            path = %path,
            error = %error,
            "schema skipped"
        );
    }
}
