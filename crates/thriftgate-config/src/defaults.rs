use camino::Utf8PathBuf;

use crate::socket::SocketEndpoint;

/// Default TCP port the gateway listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 5001;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default glob matched against schema file names.
pub const DEFAULT_SCHEMA_PATTERN: &str = "*.thrift";

/// Default interval between background schema rescans.
pub const DEFAULT_RESCAN_INTERVAL_MS: u64 = 2_000;

/// Default number of request workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default timeout for establishing upstream connections.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Default read/write timeout applied to upstream calls.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Loopback TCP endpoint the gateway binds when nothing else is configured.
pub fn default_listen_socket() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_LISTEN_PORT)
}

/// Schema root used when none is configured: the working directory.
pub fn default_schema_root() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

/// Owned schema pattern value.
pub fn default_schema_pattern() -> String {
    DEFAULT_SCHEMA_PATTERN.to_string()
}
