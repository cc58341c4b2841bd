//! Unit tests for bootstrap and process lifecycle.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use thriftgate_config::{Config, SocketEndpoint};

use super::support::{FailingConfigLoader, HealthEvent, RecordingHealthReporter, SchemaTree};
use crate::bootstrap::{BootstrapError, StaticConfigLoader, bootstrap_with};
use crate::connection::ThriftConnector;
use crate::process::{
    LaunchError, RunningGateway, ShutdownCause, ShutdownError, ShutdownSignal, run_daemon_with,
};

const CALC: &str = "service Calc { i32 add(1: i32 a, 2: i32 b) }";

#[fixture]
fn tree() -> SchemaTree {
    let tree = SchemaTree::new();
    tree.write("calc.thrift", CALC);
    tree.write("nested/broken.thrift", "service {");
    tree
}

fn bootstrap(config: Config) -> (Result<crate::Daemon, BootstrapError>, Vec<HealthEvent>) {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let outcome = bootstrap_with(&StaticConfigLoader::new(config), reporter.clone());
    (outcome, reporter.events())
}

#[rstest]
fn bootstrap_indexes_the_schema_tree(tree: SchemaTree) {
    let (outcome, events) = bootstrap(tree.config());
    let daemon = outcome.expect("bootstrap should succeed");

    assert_eq!(daemon.gateway().index().len(), 1);
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert_eq!(events.last(), Some(&HealthEvent::BootstrapSucceeded));
    assert!(events.contains(&HealthEvent::SchemaIndexed {
        path: "calc.thrift".to_owned(),
        services: 1,
    }));
    assert!(events.contains(&HealthEvent::SchemaRejected(
        "nested/broken.thrift".to_owned()
    )));
}

#[rstest]
fn configuration_failures_are_reported() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let error = bootstrap_with(&FailingConfigLoader, reporter.clone())
        .err()
        .expect("bootstrap should fail");

    assert!(matches!(error, BootstrapError::Configuration { .. }));
    assert!(
        reporter
            .events()
            .iter()
            .any(|event| matches!(event, HealthEvent::BootstrapFailed(_)))
    );
}

#[rstest]
fn invalid_schema_patterns_fail_bootstrap(tree: SchemaTree) {
    let config = Config {
        schema_pattern: "[".to_owned(),
        ..tree.config()
    };
    let (outcome, events) = bootstrap(config);

    assert!(matches!(outcome, Err(BootstrapError::Crawler { .. })));
    assert!(!events.contains(&HealthEvent::BootstrapSucceeded));
}

#[cfg(unix)]
#[rstest]
fn unix_socket_directories_are_prepared(tree: SchemaTree) {
    let socket = tree.root().join("run/nested/gateway.sock");
    let config = Config {
        listen_socket: SocketEndpoint::unix(socket.clone()),
        ..tree.config()
    };
    let (outcome, _) = bootstrap(config);

    outcome.expect("bootstrap should succeed");
    assert!(socket.parent().expect("parent").is_dir());
}

#[rstest]
fn running_gateways_answer_and_stop(tree: SchemaTree) {
    let (outcome, _) = bootstrap(tree.config());
    let daemon = outcome.expect("bootstrap");
    let connector = Arc::new(ThriftConnector::new(
        daemon.config().connect_timeout(),
        daemon.config().call_timeout(),
    ));
    let running = RunningGateway::start(&daemon, connector).expect("start gateway");
    let addr = running.local_addr().expect("tcp address");

    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .write_all(b"{\"operation\":\"list\",\"file\":\"calc.thrift\"}\n")
        .expect("send");
    let mut line = String::new();
    BufReader::new(stream)
        .read_line(&mut line)
        .expect("read reply");
    let reply: Value = serde_json::from_str(&line).expect("json reply");

    assert_eq!(
        reply,
        json!({
            "kind": "reply",
            "body": {"services": [{"path": "calc.thrift", "services": {"Calc": [{"method": "add"}]}}]},
        })
    );
    running.stop().expect("clean shutdown");
}

struct ImmediateShutdown(ShutdownCause);

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<ShutdownCause, ShutdownError> {
        Ok(self.0)
    }
}

#[rstest]
#[case::signal(ShutdownCause::Signal(15))]
#[case::request(ShutdownCause::Requested)]
fn run_daemon_returns_once_shutdown_is_signalled(tree: SchemaTree, #[case] cause: ShutdownCause) {
    let reporter = Arc::new(RecordingHealthReporter::default());
    run_daemon_with(
        &StaticConfigLoader::new(tree.config()),
        reporter.clone(),
        &ImmediateShutdown(cause),
    )
    .expect("daemon run should succeed");

    assert!(reporter.events().contains(&HealthEvent::BootstrapSucceeded));
}

#[rstest]
fn run_daemon_surfaces_bootstrap_failures() {
    let error = run_daemon_with(
        &FailingConfigLoader,
        Arc::new(RecordingHealthReporter::default()),
        &ImmediateShutdown(ShutdownCause::Requested),
    )
    .expect_err("daemon run should fail");

    assert!(matches!(error, LaunchError::Bootstrap { .. }));
}
