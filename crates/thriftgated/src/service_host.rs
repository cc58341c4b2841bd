//! Schema-driven Thrift server for stub services.
//!
//! A [`ServiceImpl`] maps method names of one service to handlers that work
//! on [`StructValue`]s; a [`ServiceHost`] serves it over framed binary
//! Thrift on TCP with one thread per client connection.
//!
//! Handler outcomes map onto replies the way generated servers do:
//!
//! - unknown method names answer an `unknown method` application exception;
//! - declared methods without a handler answer `method not implemented`;
//! - [`HandlerFailure::Declared`] sets the result field whose exception type
//!   matches, or becomes an internal error when none does;
//! - [`HandlerFailure::Internal`] becomes an internal error.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use thrift::protocol::{
    TBinaryInputProtocol, TBinaryOutputProtocol, TInputProtocol, TMessageIdentifier,
    TMessageType, TOutputProtocol, TType,
};
use thrift::transport::{TFramedReadTransport, TFramedWriteTransport};
use thrift::{TransportError, TransportErrorKind};
use thriftgate_codec::{
    ApplicationException, CodecError, ExceptionKind, StructValue, TypedValue, read_struct,
    write_struct,
};
use thriftgate_idl::{
    MethodDescriptor, ModuleDescriptor, SUCCESS_FIELD_ID, ServiceDescriptor, TypeSpec, TypeTable,
};
use tracing::{debug, info, warn};

const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service_host");
const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);

/// Why a handler did not return a value.
#[derive(Debug, Clone)]
pub enum HandlerFailure {
    /// An instance of an exception the method may declare.
    Declared(StructValue),
    /// Anything else.
    Internal(String),
}

/// Callable registered for one method. Returns the success value, or
/// `None` for `void` methods.
pub type MethodHandler =
    Box<dyn Fn(&StructValue) -> Result<Option<TypedValue>, HandlerFailure> + Send + Sync>;

/// Errors raised while building or running a service host.
#[derive(Debug, Error)]
pub enum ServiceHostError {
    /// The module declares no such service.
    #[error("service '{service}' is not declared")]
    UnknownService {
        /// Requested service.
        service: String,
    },
    /// The service declares no such method.
    #[error("method '{method}' is not declared by service '{service}'")]
    UnknownMethod {
        /// Service being built.
        service: String,
        /// Requested method.
        method: String,
    },
    /// Binding or configuring the listener failed.
    #[error("failed to bind service host: {source}")]
    Bind {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be started.
    #[error("failed to spawn service host thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("service host thread panicked")]
    ThreadPanic,
}

/// Handlers for the methods of one service, built once before serving.
pub struct ServiceImpl {
    service: ServiceDescriptor,
    types: TypeTable,
    handlers: HashMap<String, MethodHandler>,
}

impl ServiceImpl {
    /// Starts an implementation of `service` as declared in `module`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceHostError::UnknownService`] when `module` does not
    /// declare `service`.
    pub fn new(module: &ModuleDescriptor, service: &str) -> Result<Self, ServiceHostError> {
        let descriptor =
            module
                .service(service)
                .cloned()
                .ok_or_else(|| ServiceHostError::UnknownService {
                    service: service.to_owned(),
                })?;
        Ok(Self {
            service: descriptor,
            types: module.types.clone(),
            handlers: HashMap::new(),
        })
    }

    /// Registers the handler for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceHostError::UnknownMethod`] when the service does not
    /// declare `method`.
    pub fn register<F>(mut self, method: &str, handler: F) -> Result<Self, ServiceHostError>
    where
        F: Fn(&StructValue) -> Result<Option<TypedValue>, HandlerFailure> + Send + Sync + 'static,
    {
        if !self.service.has_method(method) {
            return Err(ServiceHostError::UnknownMethod {
                service: self.service.name.clone(),
                method: method.to_owned(),
            });
        }
        self.handlers.insert(method.to_owned(), Box::new(handler));
        Ok(self)
    }

    /// Service being implemented.
    #[must_use]
    pub const fn descriptor(&self) -> &ServiceDescriptor {
        &self.service
    }

    /// Runs the handler for `method` and builds its result struct.
    ///
    /// # Errors
    ///
    /// Returns the application exception the caller should receive.
    pub fn handle(
        &self,
        method: &str,
        args: &StructValue,
    ) -> Result<StructValue, ApplicationException> {
        let descriptor = self.method(method)?;
        let handler = self.handlers.get(method).ok_or_else(|| {
            ApplicationException::internal(format!("method not implemented: {method}"))
        })?;
        let mut result = StructValue::zeroed(descriptor.result.name.clone());
        match handler(args) {
            Ok(Some(value)) if descriptor.success_field().is_some() => {
                result.set(SUCCESS_FIELD_ID, value);
            }
            Ok(_) => {}
            Err(HandlerFailure::Declared(exception)) => {
                let field = descriptor
                    .exception_fields()
                    .find(|field| matches!(&field.ty, TypeSpec::Struct(name) if name == exception.name()))
                    .ok_or_else(|| {
                        ApplicationException::internal(format!(
                            "uncaught exception: {}",
                            exception.name()
                        ))
                    })?;
                result.set(field.id, TypedValue::Struct(exception));
            }
            Err(HandlerFailure::Internal(message)) => {
                return Err(ApplicationException::internal(format!(
                    "uncaught exception: {message}"
                )));
            }
        }
        Ok(result)
    }

    fn method(&self, name: &str) -> Result<&MethodDescriptor, ApplicationException> {
        self.service.method(name).ok_or_else(|| {
            ApplicationException::new(
                ExceptionKind::UnknownMethod,
                format!("method \"{name}\" not found in {}", self.service.name),
            )
        })
    }

    fn respond(
        &self,
        header: &TMessageIdentifier,
        input: &mut dyn TInputProtocol,
        output: &mut dyn TOutputProtocol,
    ) -> Result<(), CodecError> {
        let outcome = match self.method(&header.name) {
            Ok(descriptor) => {
                let args = read_struct(input, &descriptor.args, &self.types)?;
                input.read_message_end()?;
                self.handle(&header.name, &args)
                    .map(|result| (descriptor, result))
            }
            Err(exception) => {
                input.skip(TType::Struct)?;
                input.read_message_end()?;
                Err(exception)
            }
        };
        if header.message_type == TMessageType::OneWay {
            if let Err(exception) = outcome {
                warn!(target: HOST_TARGET, method = %header.name, %exception, "oneway call failed");
            }
            return Ok(());
        }
        match outcome {
            Ok((descriptor, result)) => {
                output.write_message_begin(&TMessageIdentifier::new(
                    header.name.as_str(),
                    TMessageType::Reply,
                    header.sequence_number,
                ))?;
                write_struct(output, &result, &descriptor.result, &self.types)?;
            }
            Err(exception) => {
                debug!(target: HOST_TARGET, method = %header.name, %exception, "answering with exception");
                output.write_message_begin(&TMessageIdentifier::new(
                    header.name.as_str(),
                    TMessageType::Exception,
                    header.sequence_number,
                ))?;
                exception.write(output)?;
            }
        }
        output.write_message_end()?;
        output.flush()?;
        Ok(())
    }
}

/// A bound, not yet serving, Thrift server.
pub struct ServiceHost {
    listener: TcpListener,
    service: Arc<ServiceImpl>,
}

impl ServiceHost {
    /// Binds `addr` for `service`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceHostError::Bind`] when the address cannot be bound.
    pub fn bind(addr: impl ToSocketAddrs, service: ServiceImpl) -> Result<Self, ServiceHostError> {
        let listener = TcpListener::bind(addr).map_err(|source| ServiceHostError::Bind { source })?;
        Ok(Self {
            listener,
            service: Arc::new(service),
        })
    }

    /// Address the host is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceHostError::Bind`] when the socket cannot report it.
    pub fn local_addr(&self) -> Result<SocketAddr, ServiceHostError> {
        self.listener
            .local_addr()
            .map_err(|source| ServiceHostError::Bind { source })
    }

    /// Starts accepting clients on a background thread.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot be made non-blocking or the
    /// thread cannot be spawned.
    pub fn start(self) -> Result<ServiceHostHandle, ServiceHostError> {
        let local_addr = self.local_addr()?;
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ServiceHostError::Bind { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(format!("thriftgate-host-{}", self.service.service.name))
            .spawn(move || self.accept_loop(&flag))
            .map_err(|source| ServiceHostError::Spawn { source })?;
        info!(
            target: HOST_TARGET,
            %local_addr,
            "service host listening"
        );
        Ok(ServiceHostHandle {
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    fn accept_loop(self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let service = Arc::clone(&self.service);
                    let spawned = thread::Builder::new()
                        .name(format!("thriftgate-host-client-{peer}"))
                        .spawn(move || {
                            if let Err(error) = serve_client(stream, &service) {
                                warn!(target: HOST_TARGET, %peer, %error, "client session failed");
                            }
                        });
                    if let Err(error) = spawned {
                        warn!(target: HOST_TARGET, %peer, %error, "failed to spawn client thread");
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(error) => {
                    warn!(target: HOST_TARGET, %error, "accept failed");
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }
    }
}

/// Handle to a running [`ServiceHost`]. Dropping it stops accepting.
pub struct ServiceHostHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ServiceHostHandle {
    /// Address clients connect to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new clients. Sessions already open run until their
    /// client disconnects.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Stops accepting and waits for the accept thread.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceHostError::ThreadPanic`] when the thread panicked.
    pub fn join(mut self) -> Result<(), ServiceHostError> {
        self.shutdown();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ServiceHostError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ServiceHostHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve_client(stream: TcpStream, service: &ServiceImpl) -> Result<(), CodecError> {
    stream.set_nonblocking(false).map_err(thrift::Error::from)?;
    let read_half = stream.try_clone().map_err(thrift::Error::from)?;
    let mut input = TBinaryInputProtocol::new(TFramedReadTransport::new(read_half), true);
    let mut output = TBinaryOutputProtocol::new(TFramedWriteTransport::new(stream), true);
    loop {
        let header = match input.read_message_begin() {
            Ok(header) => header,
            Err(error) if is_disconnect(&error) => return Ok(()),
            Err(error) => return Err(error.into()),
        };
        service.respond(&header, &mut input, &mut output)?;
    }
}

fn is_disconnect(error: &thrift::Error) -> bool {
    match error {
        thrift::Error::Transport(TransportError { kind, .. }) => {
            *kind == TransportErrorKind::EndOfFile
        }
        thrift::Error::Protocol(_) | thrift::Error::Application(_) | thrift::Error::User(_) => {
            false
        }
    }
}

#[cfg(test)]
mod tests;
