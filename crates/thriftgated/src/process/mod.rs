//! Process lifecycle: starting the listener, workers, and crawler around a
//! bootstrapped gateway, then tearing them down on a termination signal.

mod errors;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::{RunningGateway, run_daemon, run_daemon_with};
pub use shutdown::{ShutdownCause, ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
