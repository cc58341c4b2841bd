//! Tests for the stub service host, driven through the real client.

use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use thriftgate_idl::SchemaLoader;

use super::*;
use crate::connection::{CallError, Connection, ConnectionKey, Connector, ThriftConnector};

const CALC: &str = r"
exception DivideByZero { 1: string message }
exception Overflow { 1: i32 limit }
service Calc {
  i32 add(1: i32 a, 2: i32 b),
  i32 divide(1: i32 a, 2: i32 b) throws (1: DivideByZero oops),
  void reset(),
  string describe(),
  oneway void ping()
}
";

#[fixture]
fn module() -> ModuleDescriptor {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("calc.thrift");
    fs::write(&path, CALC).expect("write schema");
    SchemaLoader::default().load(&path).expect("load schema")
}

fn int(args: &StructValue, id: i16) -> i32 {
    match args.get(id) {
        Some(TypedValue::I32(value)) => *value,
        other => panic!("field {id} is not an i32: {other:?}"),
    }
}

fn divide_by_zero(message: &str) -> StructValue {
    let mut exception = StructValue::zeroed("DivideByZero");
    exception.set(1, TypedValue::String(message.to_owned()));
    exception
}

fn calc(module: &ModuleDescriptor) -> ServiceImpl {
    ServiceImpl::new(module, "Calc")
        .expect("Calc is declared")
        .register("add", |args| {
            Ok(Some(TypedValue::I32(int(args, 1) + int(args, 2))))
        })
        .expect("add is declared")
        .register("divide", |args| {
            let divisor = int(args, 2);
            if divisor == 0 {
                return Err(HandlerFailure::Declared(divide_by_zero("divisor is zero")));
            }
            Ok(Some(TypedValue::I32(int(args, 1) / divisor)))
        })
        .expect("divide is declared")
        .register("reset", |_| {
            let mut overflow = StructValue::zeroed("Overflow");
            overflow.set(1, TypedValue::I32(10));
            Err(HandlerFailure::Declared(overflow))
        })
        .expect("reset is declared")
        .register("ping", |_| Err(HandlerFailure::Internal("ignored".to_owned())))
        .expect("ping is declared")
}

fn args(a: i32, b: i32) -> StructValue {
    let mut value = StructValue::zeroed("add_args");
    value.set(1, TypedValue::I32(a));
    value.set(2, TypedValue::I32(b));
    value
}

struct Served {
    module: ModuleDescriptor,
    host: ServiceHostHandle,
    connection: Box<dyn Connection>,
}

impl Served {
    fn call(&mut self, method: &str, args: &StructValue) -> Result<Option<StructValue>, CallError> {
        let service = self.module.service("Calc").expect("Calc");
        let method = service.method(method).expect("declared method");
        self.connection.invoke(method, args, &self.module.types)
    }
}

#[fixture]
fn served(module: ModuleDescriptor) -> Served {
    let host = ServiceHost::bind("127.0.0.1:0", calc(&module))
        .expect("bind host")
        .start()
        .expect("start host");
    let key = ConnectionKey {
        path: Utf8PathBuf::from("calc.thrift"),
        service: "Calc".to_owned(),
        host: "127.0.0.1".to_owned(),
        port: host.local_addr().port(),
    };
    let connection = ThriftConnector::new(Duration::from_secs(2), Duration::from_secs(2))
        .connect(&key)
        .expect("connect");
    Served {
        module,
        host,
        connection,
    }
}

fn remote_exception(outcome: Result<Option<StructValue>, CallError>) -> ApplicationException {
    match outcome {
        Err(CallError::Application(exception)) => exception,
        other => panic!("expected an application exception, got {other:?}"),
    }
}

#[rstest]
fn registered_handlers_answer_with_success(mut served: Served) {
    let result = served.call("add", &args(2, 3)).expect("call").expect("reply");
    assert_eq!(result.get(0), Some(&TypedValue::I32(5)));
}

#[rstest]
fn declared_exceptions_fill_their_result_field(mut served: Served) {
    let result = served
        .call("divide", &args(1, 0))
        .expect("call")
        .expect("reply");
    assert!(!result.is_set(0));
    assert_eq!(
        result.get(1),
        Some(&TypedValue::Struct(divide_by_zero("divisor is zero")))
    );
}

#[rstest]
fn undeclared_exceptions_become_internal_errors(mut served: Served) {
    let exception = remote_exception(served.call("reset", &StructValue::zeroed("reset_args")));
    assert_eq!(exception.kind, ExceptionKind::InternalError);
    assert_eq!(exception.message, "uncaught exception: Overflow");
}

#[rstest]
fn unregistered_methods_are_not_implemented(mut served: Served) {
    let exception = remote_exception(served.call("describe", &StructValue::zeroed("describe_args")));
    assert_eq!(exception.kind, ExceptionKind::InternalError);
    assert_eq!(exception.message, "method not implemented: describe");
}

#[rstest]
fn oneway_failures_do_not_disturb_the_session(mut served: Served) {
    let outcome = served
        .call("ping", &StructValue::zeroed("ping_args"))
        .expect("oneway send");
    assert!(outcome.is_none());
    let result = served.call("add", &args(4, 4)).expect("call").expect("reply");
    assert_eq!(result.get(0), Some(&TypedValue::I32(8)));
}

#[rstest]
fn sessions_outlive_the_accept_loop(mut served: Served) {
    served.host.shutdown();
    let result = served.call("add", &args(1, 1)).expect("call").expect("reply");
    assert_eq!(result.get(0), Some(&TypedValue::I32(2)));
}

#[rstest]
fn unknown_methods_answer_unknown_method(module: ModuleDescriptor) {
    let service = calc(&module);
    let exception = service
        .handle("multiply", &StructValue::zeroed("multiply_args"))
        .expect_err("unknown method");
    assert_eq!(exception.kind, ExceptionKind::UnknownMethod);
    assert_eq!(exception.message, "method \"multiply\" not found in Calc");
}

#[rstest]
fn handlers_returning_nothing_leave_success_unset(module: ModuleDescriptor) {
    let service = ServiceImpl::new(&module, "Calc")
        .expect("Calc")
        .register("add", |_| Ok(None))
        .expect("add");
    let result = service.handle("add", &args(1, 2)).expect("handled");
    assert!(!result.is_set(0));
    assert_eq!(result.name(), "add_result");
}

#[rstest]
fn registration_is_checked_against_the_schema(module: ModuleDescriptor) {
    assert!(matches!(
        ServiceImpl::new(&module, "Abacus"),
        Err(ServiceHostError::UnknownService { service }) if service == "Abacus"
    ));
    let unknown = ServiceImpl::new(&module, "Calc")
        .expect("Calc")
        .register("multiply", |_| Ok(None));
    assert!(matches!(
        unknown,
        Err(ServiceHostError::UnknownMethod { method, .. }) if method == "multiply"
    ));
}
