//! Connection handler that dispatches JSONL requests to the gateway.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::DISPATCH_TARGET;
use super::errors::{DispatchError, RequestError};
use super::request::GatewayRequest;
use super::response::ResponseWriter;
use crate::gateway::{Gateway, GatewayError};
use crate::transport::{ConnectionHandler, ConnectionStream, WorkerContext};

/// Maximum size of a single request line in bytes.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// How long a worker waits for a client to finish its request line.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection handler that answers one JSONL request per connection.
pub struct GatewayConnectionHandler {
    gateway: Arc<Gateway>,
}

impl GatewayConnectionHandler {
    /// Creates a handler serving `gateway`.
    pub const fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    fn dispatch(&self, mut stream: ConnectionStream, context: &mut WorkerContext) {
        if let Err(error) = stream.set_read_timeout(Some(REQUEST_READ_TIMEOUT)) {
            debug!(target: DISPATCH_TARGET, %error, "failed to set request read timeout");
        }
        let request_bytes = match read_request_line(&mut stream) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(target: DISPATCH_TARGET, "client disconnected without request");
                return;
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "failed to read request");
                report(ResponseWriter::new(&mut stream).write_error(error.to_string()));
                return;
            }
        };

        let mut writer = ResponseWriter::new(&mut stream);
        let request = match GatewayRequest::parse(&request_bytes) {
            Ok(request) => request,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "invalid request");
                report(writer.write_error(error.to_string()));
                return;
            }
        };

        debug!(
            target: DISPATCH_TARGET,
            operation = request.operation(),
            worker = context.id(),
            "dispatching request"
        );
        let written = match self.serve(&request, context) {
            Ok(body) => writer.write_reply(body),
            Err(error) if error.is_not_found() => {
                debug!(target: DISPATCH_TARGET, %error, "not found");
                writer.write_not_found(error.to_string())
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "request failed");
                writer.write_error(error.to_string())
            }
        };
        report(written);
    }

    fn serve(
        &self,
        request: &GatewayRequest,
        context: &mut WorkerContext,
    ) -> Result<Value, GatewayError> {
        match request {
            GatewayRequest::Call(call) => self
                .gateway
                .call(context.connections(), call)
                .map(|response| response.to_json()),
            GatewayRequest::List(list) => self.gateway.list_services(list.file.as_deref()),
            GatewayRequest::Sample(sample) => {
                self.gateway
                    .sample(&sample.file, &sample.service, &sample.method)
            }
        }
    }
}

impl ConnectionHandler for GatewayConnectionHandler {
    fn handle(&self, stream: ConnectionStream, context: &mut WorkerContext) {
        self.dispatch(stream, context);
    }
}

fn report(written: Result<(), DispatchError>) {
    if let Err(error) = written {
        warn!(target: DISPATCH_TARGET, %error, "failed to write response");
    }
}

/// Reads a bounded JSONL request line.
///
/// Returns `Ok(None)` if the client disconnects without sending data and
/// `Ok(Some(bytes))` once a complete line (or EOF with partial data) is
/// received.
fn read_request_line(reader: &mut impl Read) -> Result<Option<Vec<u8>>, DispatchError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];

    loop {
        let bytes_read = read_with_retry(reader, &mut chunk)?;
        let Some(received) = chunk.get(..bytes_read).filter(|read| !read.is_empty()) else {
            return Ok((!buffer.is_empty()).then_some(buffer));
        };

        if let Some(newline) = received.iter().position(|byte| *byte == b'\n') {
            buffer.extend(received.iter().take(newline.saturating_add(1)));
            enforce_limit(buffer.len())?;
            return Ok(Some(buffer));
        }

        buffer.extend_from_slice(received);
        enforce_limit(buffer.len())?;
    }
}

/// Reads from the stream, retrying on interrupts.
fn read_with_retry(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

/// Enforces the maximum request size limit.
fn enforce_limit(size: usize) -> Result<(), DispatchError> {
    if size > MAX_REQUEST_BYTES {
        return Err(RequestError::TooLarge {
            size,
            limit: MAX_REQUEST_BYTES,
        }
        .into());
    }
    Ok(())
}
