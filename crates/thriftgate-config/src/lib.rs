//! Shared configuration for the thriftgate daemon.
//!
//! Configuration is layered by [`ortho_config`]: command-line flags override
//! `THRIFTGATE_*` environment variables, which override values from a
//! configuration file (`--config-path` / `THRIFTGATE_CONFIG_PATH`), which
//! override the built-in defaults. Every field has a default, so an
//! empty environment produces a daemon that listens on `tcp://127.0.0.1:5001`
//! and indexes `*.thrift` files below the working directory.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_LISTEN_PORT, DEFAULT_LOG_FILTER,
    DEFAULT_RESCAN_INTERVAL_MS, DEFAULT_SCHEMA_PATTERN, DEFAULT_WORKERS, default_listen_socket,
    default_log_filter, default_log_filter_string, default_log_format, default_schema_pattern,
    default_schema_root,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "THRIFTGATE")]
pub struct Config {
    /// Endpoint the JSONL front-end listens on.
    #[ortho_config(default = default_listen_socket())]
    pub listen_socket: SocketEndpoint,
    /// Directory crawled for schema files; listed paths are relative to it.
    #[ortho_config(default = default_schema_root())]
    pub schema_root: Utf8PathBuf,
    /// Glob matched against schema file names.
    #[ortho_config(default = default_schema_pattern())]
    pub schema_pattern: String,
    /// Extra directories searched when resolving `include` statements.
    #[ortho_config(default = Vec::new())]
    pub include_dirs: Vec<Utf8PathBuf>,
    /// Interval between background rescans of the schema root.
    #[ortho_config(default = DEFAULT_RESCAN_INTERVAL_MS)]
    pub rescan_interval_ms: u64,
    /// Number of request worker threads.
    #[ortho_config(default = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Timeout for opening an upstream connection.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// Read/write timeout for upstream calls.
    #[ortho_config(default = DEFAULT_CALL_TIMEOUT_MS)]
    pub call_timeout_ms: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_listen_socket(),
            schema_root: default_schema_root(),
            schema_pattern: default_schema_pattern(),
            include_dirs: Vec::new(),
            rescan_interval_ms: DEFAULT_RESCAN_INTERVAL_MS,
            workers: DEFAULT_WORKERS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Endpoint the front-end binds.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Root directory of the schema tree.
    #[must_use]
    pub fn schema_root(&self) -> &Utf8Path {
        self.schema_root.as_path()
    }

    /// File-name glob for schema files.
    #[must_use]
    pub fn schema_pattern(&self) -> &str {
        self.schema_pattern.as_str()
    }

    /// Additional include search directories.
    #[must_use]
    pub fn include_dirs(&self) -> &[Utf8PathBuf] {
        &self.include_dirs
    }

    /// Pause between crawler passes.
    #[must_use]
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }

    /// Number of workers, never less than one.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.max(1)
    }

    /// Upstream connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Upstream read/write timeout.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
