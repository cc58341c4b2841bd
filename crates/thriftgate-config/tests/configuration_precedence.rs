//! Layering tests for configuration sources.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use thriftgate_config::{Config, LogFormat, SocketEndpoint};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvOverride {
    fn set_var(guard: MutexGuard<'static, ()>, key: &'static str, value: &OsStr) -> Self {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` on the 2024 edition; the override
        // restores the previous value in `Drop`.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn write_config(dir: &Path, body: &str) -> OsString {
    let path = dir.join("thriftgate.toml");
    fs::write(&path, body).expect("write configuration");
    path.into_os_string()
}

fn lock_env() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().expect("env mutex poisoned")
}

#[rstest]
fn file_values_apply(temp_dir: TempDir) {
    let _guard = lock_env();
    let path = write_config(
        temp_dir.path(),
        "schema_root = \"/srv/idl\"\nworkers = 8\nlog_format = \"compact\"\n",
    );
    let config = Config::load_from_iter(vec![
        OsString::from("thriftgated"),
        OsString::from("--config-path"),
        path,
    ])
    .expect("load configuration");

    assert_eq!(config.schema_root().as_str(), "/srv/idl");
    assert_eq!(config.workers(), 8);
    assert_eq!(config.log_format(), LogFormat::Compact);
}

#[rstest]
fn environment_overrides_file(temp_dir: TempDir) {
    let path = write_config(temp_dir.path(), "schema_pattern = \"*.idl\"\n");
    let _env = EnvOverride::set_var(lock_env(), "THRIFTGATE_SCHEMA_PATTERN", OsStr::new("*.thrift"));
    let config = Config::load_from_iter(vec![
        OsString::from("thriftgated"),
        OsString::from("--config-path"),
        path,
    ])
    .expect("load configuration");

    assert_eq!(config.schema_pattern(), "*.thrift");
}

#[rstest]
fn cli_overrides_environment() {
    let _env = EnvOverride::set_var(
        lock_env(),
        "THRIFTGATE_LISTEN_SOCKET",
        OsStr::new("tcp://127.0.0.1:6000"),
    );
    let config = Config::load_from_iter(vec![
        OsString::from("thriftgated"),
        OsString::from("--listen-socket"),
        OsString::from("tcp://0.0.0.0:7000"),
    ])
    .expect("load configuration");

    assert_eq!(config.listen_socket(), &SocketEndpoint::tcp("0.0.0.0", 7000));
}

#[rstest]
fn malformed_file_is_rejected(temp_dir: TempDir) {
    let _guard = lock_env();
    let path = write_config(temp_dir.path(), "workers = \"many\"\n");
    let result = Config::load_from_iter(vec![
        OsString::from("thriftgated"),
        OsString::from("--config-path"),
        path,
    ]);

    assert!(result.is_err(), "non-numeric worker count must fail");
}
