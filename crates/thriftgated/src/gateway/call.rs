//! Call requests, responses, and the per-call translation path.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use thriftgate_codec::{ApplicationException, ExceptionKind, decode_struct, encode_struct};
use tracing::{debug, warn};

use super::{DISPATCH_TARGET, Resolved, WILDCARD};
use crate::connection::{CallError, Connection, ConnectionCache, ConnectionKey};

/// One call, as received from a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallRequest {
    /// Schema file pattern.
    #[serde(default = "wildcard")]
    pub file: String,
    /// Service pattern.
    #[serde(default = "wildcard")]
    pub service: String,
    /// Method name.
    pub method: String,
    /// Remote host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Argument object keyed by parameter name.
    #[serde(default = "empty_args")]
    pub args: Value,
}

impl CallRequest {
    /// A request for `method` on `host:port` with wildcard patterns and no
    /// arguments.
    #[must_use]
    pub fn new(method: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            file: wildcard(),
            service: wildcard(),
            method: method.into(),
            host: host.into(),
            port,
            args: empty_args(),
        }
    }

    /// Sets the file pattern.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Sets the service pattern.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Sets the argument object.
    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}

fn wildcard() -> String {
    WILDCARD.to_owned()
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn empty_args() -> Value {
    Value::Object(Map::new())
}

/// Why a call produced an exception payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The connection could not be opened, or failed mid-call.
    Transport,
    /// The remote side raised an application exception.
    Remote,
    /// Several services matched the request.
    Ambiguous,
    /// Arguments or results did not fit the schema.
    Conversion,
}

impl FailureKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Remote => "remote",
            Self::Ambiguous => "ambiguous",
            Self::Conversion => "conversion",
        }
    }
}

/// Outcome of a resolved call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResponse {
    /// The remote returned normally. `body` holds every result field by
    /// name; `declared_exception` is set when the remote filled one of the
    /// method's declared exception fields instead of `success`.
    Result {
        /// Encoded result struct.
        body: Value,
        /// Whether a declared exception field is set.
        declared_exception: bool,
    },
    /// The call failed before or instead of producing a result.
    Failure {
        /// Failure category.
        kind: FailureKind,
        /// Exception reported to the client.
        exception: ApplicationException,
    },
}

impl CallResponse {
    /// A failure described by `message`.
    ///
    /// Failures raised by the gateway itself (conversion and ambiguity) are
    /// internal errors reading `uncaught exception: <message>`. Transport
    /// and remote failures keep the unknown kind and the bare message.
    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        let exception = match kind {
            FailureKind::Conversion | FailureKind::Ambiguous => {
                ApplicationException::internal(format!("uncaught exception: {}", message.into()))
            }
            FailureKind::Transport | FailureKind::Remote => ApplicationException::unknown(message),
        };
        Self::Failure { kind, exception }
    }

    /// Whether the response reports any exception, declared or not.
    #[must_use]
    pub const fn carries_exception(&self) -> bool {
        match self {
            Self::Result {
                declared_exception, ..
            } => *declared_exception,
            Self::Failure { .. } => true,
        }
    }

    /// The payload returned to clients.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Result { body, .. } => body.clone(),
            Self::Failure { kind, exception } => json!({
                "exception": exception.to_json(),
                "kind": kind.as_str(),
            }),
        }
    }
}

pub(super) fn dispatch(
    connections: &mut ConnectionCache,
    resolved: &Resolved,
    request: &CallRequest,
) -> CallResponse {
    let key = ConnectionKey {
        path: resolved.entry.path().to_path_buf(),
        service: resolved.service.clone(),
        host: request.host.clone(),
        port: request.port,
    };
    let response = match connections.get(&key) {
        Ok(connection) => invoke(connection, resolved, &request.args),
        Err(error) => {
            warn!(target: DISPATCH_TARGET, %key, %error, "failed to open connection");
            return CallResponse::failure(FailureKind::Transport, error.to_string());
        }
    };
    if response.carries_exception() {
        connections.evict(&key);
    }
    debug!(
        target: DISPATCH_TARGET,
        %key,
        method = %resolved.method.name,
        exception = response.carries_exception(),
        "call completed"
    );
    response
}

fn invoke(connection: &mut dyn Connection, resolved: &Resolved, args: &Value) -> CallResponse {
    let types = resolved.entry.types();
    let method = &resolved.method;
    let decoded = match decode_struct(args, &method.args, types) {
        Ok(decoded) => decoded,
        Err(error) => return CallResponse::failure(FailureKind::Conversion, error.to_string()),
    };
    let result = match connection.invoke(method, &decoded, types) {
        Ok(Some(result)) => result,
        Ok(None) => {
            return CallResponse::Result {
                body: empty_args(),
                declared_exception: false,
            };
        }
        Err(CallError::Application(exception)) => {
            return CallResponse::Failure {
                kind: FailureKind::Remote,
                exception,
            };
        }
        Err(CallError::Codec(error)) => {
            return CallResponse::failure(FailureKind::Conversion, error.to_string());
        }
        Err(error @ (CallError::Transport(_) | CallError::Protocol { .. })) => {
            warn!(target: DISPATCH_TARGET, method = %method.name, %error, "call failed");
            return CallResponse::failure(FailureKind::Transport, error.to_string());
        }
    };

    let declared_exception = method
        .exception_fields()
        .any(|field| result.is_set(field.id));
    let missing_success = method
        .success_field()
        .is_some_and(|field| !result.is_set(field.id));
    if missing_success && !declared_exception {
        return CallResponse::Failure {
            kind: FailureKind::Remote,
            exception: ApplicationException::new(
                ExceptionKind::MissingResult,
                format!("{} failed: unknown result", method.name),
            ),
        };
    }
    match encode_struct(&result, &method.result, types) {
        Ok(body) => CallResponse::Result {
            body,
            declared_exception,
        },
        Err(error) => CallResponse::failure(FailureKind::Conversion, error.to_string()),
    }
}
