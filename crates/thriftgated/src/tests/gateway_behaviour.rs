//! Behavioural tests for calls travelling client -> gateway -> upstream.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use thriftgate_codec::{StructValue, TypedValue};
use thriftgate_idl::SchemaLoader;

use super::support::{RecordingHealthReporter, SchemaTree};
use crate::bootstrap::{StaticConfigLoader, bootstrap_with};
use crate::connection::ThriftConnector;
use crate::process::RunningGateway;
use crate::service_host::{HandlerFailure, ServiceHost, ServiceHostHandle, ServiceImpl};

const CALC: &str = r"
exception DivideByZero { 1: string message }
service Calc {
  i32 add(1: i32 a, 2: i32 b),
  i32 divide(1: i32 a, 2: i32 b) throws (1: DivideByZero oops)
}
";
const CALC_WITH_MULTIPLY: &str = r"
exception DivideByZero { 1: string message }
service Calc {
  i32 add(1: i32 a, 2: i32 b),
  i32 divide(1: i32 a, 2: i32 b) throws (1: DivideByZero oops),
  i32 multiply(1: i32 a, 2: i32 b)
}
";
const WAIT_TIMEOUT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

type StepResult = Result<(), String>;

struct GatewayWorld {
    tree: SchemaTree,
    upstream: Option<ServiceHostHandle>,
    running: Option<RunningGateway>,
    reply: Option<Value>,
}

impl GatewayWorld {
    fn new() -> Self {
        Self {
            tree: SchemaTree::new(),
            upstream: None,
            running: None,
            reply: None,
        }
    }

    fn gateway_addr(&self) -> Result<std::net::SocketAddr, String> {
        self.running
            .as_ref()
            .and_then(RunningGateway::local_addr)
            .ok_or_else(|| "gateway is not running".to_owned())
    }

    fn upstream_port(&self) -> Result<u16, String> {
        self.upstream
            .as_ref()
            .map(|host| host.local_addr().port())
            .ok_or_else(|| "no upstream service".to_owned())
    }

    fn exchange(&self, request: &Value) -> Result<Value, String> {
        let mut stream = TcpStream::connect(self.gateway_addr()?).map_err(|e| e.to_string())?;
        let mut line = request.to_string();
        line.push('\n');
        stream
            .write_all(line.as_bytes())
            .map_err(|e| e.to_string())?;
        let mut response = String::new();
        BufReader::new(stream)
            .read_line(&mut response)
            .map_err(|e| e.to_string())?;
        serde_json::from_str(&response).map_err(|e| e.to_string())
    }

    fn call(&mut self, method: &str, port: u16, a: i32, b: i32) -> StepResult {
        let request = json!({
            "operation": "call",
            "method": method,
            "port": port,
            "args": {"a": a, "b": b},
        });
        self.reply = Some(self.exchange(&request)?);
        Ok(())
    }

    fn reply(&self) -> &Value {
        self.reply.as_ref().expect("no reply recorded")
    }
}

impl Drop for GatewayWorld {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop().expect("gateway shutdown");
        }
    }
}

#[fixture]
fn world() -> RefCell<GatewayWorld> {
    RefCell::new(GatewayWorld::new())
}

fn int(args: &StructValue, id: i16) -> i32 {
    match args.get(id) {
        Some(TypedValue::I32(value)) => *value,
        other => panic!("field {id} is not an i32: {other:?}"),
    }
}

#[given("a schema tree declaring the Calc service")]
fn given_schema_tree(world: &RefCell<GatewayWorld>) {
    world.borrow().tree.write("calc.thrift", CALC);
}

#[given("an upstream Calc service")]
fn given_upstream(world: &RefCell<GatewayWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let module = SchemaLoader::default()
        .load(world.tree.root().join("calc.thrift").as_std_path())
        .map_err(|e| e.to_string())?;
    let service = ServiceImpl::new(&module, "Calc")
        .and_then(|service| {
            service.register("add", |args| {
                Ok(Some(TypedValue::I32(int(args, 1) + int(args, 2))))
            })
        })
        .and_then(|service| {
            service.register("divide", |args| {
                let divisor = int(args, 2);
                if divisor == 0 {
                    let mut oops = StructValue::zeroed("DivideByZero");
                    oops.set(1, TypedValue::String("divisor is zero".to_owned()));
                    return Err(HandlerFailure::Declared(oops));
                }
                Ok(Some(TypedValue::I32(int(args, 1) / divisor)))
            })
        })
        .map_err(|e| e.to_string())?;
    let host = ServiceHost::bind("127.0.0.1:0", service)
        .and_then(ServiceHost::start)
        .map_err(|e| e.to_string())?;
    world.upstream = Some(host);
    Ok(())
}

#[given("a running gateway")]
fn given_running_gateway(world: &RefCell<GatewayWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let loader = StaticConfigLoader::new(world.tree.config());
    let daemon = bootstrap_with(&loader, Arc::new(RecordingHealthReporter::default()))
        .map_err(|e| e.to_string())?;
    let connector = Arc::new(ThriftConnector::new(
        daemon.config().connect_timeout(),
        daemon.config().call_timeout(),
    ));
    let running = RunningGateway::start(&daemon, connector).map_err(|e| e.to_string())?;
    world.running = Some(running);
    Ok(())
}

#[when("the schema gains a multiply method")]
fn when_schema_gains_method(world: &RefCell<GatewayWorld>) -> StepResult {
    let world = world.borrow();
    world.tree.write("calc.thrift", CALC_WITH_MULTIPLY);
    let listing = json!({"operation": "list", "file": "calc.thrift"});
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        let reply = world.exchange(&listing)?;
        let methods = &reply["body"]["services"][0]["services"]["Calc"];
        if methods
            .as_array()
            .is_some_and(|methods| methods.contains(&json!({"method": "multiply"})))
        {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }
    Err("gateway never picked up the schema edit".to_owned())
}

#[when("a client calls {method} with {a} and {b}")]
fn when_client_calls(world: &RefCell<GatewayWorld>, method: String, a: i32, b: i32) -> StepResult {
    let mut world = world.borrow_mut();
    let port = world.upstream_port()?;
    world.call(&method, port, a, b)
}

#[when("a client calls {method} on a closed port")]
fn when_client_calls_closed_port(world: &RefCell<GatewayWorld>, method: String) -> StepResult {
    let port = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).map_err(|e| e.to_string())?;
        listener.local_addr().map_err(|e| e.to_string())?.port()
    };
    world.borrow_mut().call(&method, port, 1, 1)
}

#[then("the reply kind is {kind}")]
fn then_reply_kind(world: &RefCell<GatewayWorld>, kind: String) {
    let world = world.borrow();
    assert_eq!(world.reply()["kind"], json!(kind), "reply: {}", world.reply());
}

#[then("the success value is {value}")]
fn then_success_value(world: &RefCell<GatewayWorld>, value: i64) {
    assert_eq!(world.borrow().reply()["body"], json!({"success": value}));
}

#[then("the declared exception says {message}")]
fn then_declared_exception(world: &RefCell<GatewayWorld>, message: String) {
    assert_eq!(
        world.borrow().reply()["body"],
        json!({"success": 0, "oops": {"message": message}})
    );
}

#[then("the failure kind is {kind}")]
fn then_failure_kind(world: &RefCell<GatewayWorld>, kind: String) {
    assert_eq!(world.borrow().reply()["body"]["kind"], json!(kind));
}

#[then("the exception type is {code}")]
fn then_exception_type(world: &RefCell<GatewayWorld>, code: i64) {
    assert_eq!(
        world.borrow().reply()["body"]["exception"]["type"],
        json!(code)
    );
}

#[scenario(
    path = "tests/features/gateway_call.feature",
    name = "A call returns the upstream result"
)]
fn call_returns_result(world: RefCell<GatewayWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/gateway_call.feature",
    name = "A declared exception is returned by name"
)]
fn declared_exception_returned(world: RefCell<GatewayWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/gateway_call.feature",
    name = "An unknown method is not found"
)]
fn unknown_method_not_found(world: RefCell<GatewayWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/gateway_call.feature",
    name = "An unreachable upstream yields a transport exception"
)]
fn unreachable_upstream(world: RefCell<GatewayWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/gateway_call.feature",
    name = "Schema edits are picked up without a restart"
)]
fn schema_edits_picked_up(world: RefCell<GatewayWorld>) {
    drop(world);
}
