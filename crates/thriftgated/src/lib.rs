//! Schema-driven JSON to Thrift gateway.
//!
//! The daemon crawls a directory of Thrift IDL files, keeps a live index of
//! the services they declare, and answers newline-delimited JSON requests:
//! `call` translates a JSON argument object into a framed binary Thrift call
//! against a remote service and returns its result as JSON, `list` describes
//! the indexed services, and `sample` renders example payloads for a method.
//!
//! Startup follows a fixed sequence. [`bootstrap_with`] loads configuration,
//! installs structured telemetry, prepares the listen socket, and indexes the
//! schema tree; [`RunningGateway`] then binds the listener, starts the worker
//! pool, and keeps a crawler thread re-scanning the tree so edited files are
//! re-parsed on their next use. Each worker owns its upstream connections,
//! so a connection is never shared between concurrent calls.
//!
//! [`service_host`] offers the reverse direction: serving a schema-described
//! service from Rust handlers, which is mostly useful for stubs and tests.

mod bootstrap;
pub mod connection;
pub mod crawler;
mod dispatch;
pub mod gateway;
mod health;
pub mod index;
mod process;
pub mod service_host;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, RunningGateway, ShutdownCause, ShutdownError, ShutdownSignal,
    SystemShutdownSignal, run_daemon, run_daemon_with,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
