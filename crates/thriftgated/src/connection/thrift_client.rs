//! Framed binary Thrift client connections over TCP.

use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thrift::protocol::{
    TBinaryInputProtocol, TBinaryOutputProtocol, TInputProtocol, TMessageIdentifier,
    TMessageType, TOutputProtocol,
};
use thrift::transport::{TFramedReadTransport, TFramedWriteTransport};
use thriftgate_codec::{ApplicationException, StructValue, read_struct, write_struct};
use thriftgate_idl::{MethodDescriptor, TypeTable};

use super::{CallError, ConnectError, Connection, ConnectionKey, Connector};

/// Opens [`ThriftConnection`]s with fixed connect and I/O timeouts.
#[derive(Debug, Clone, Copy)]
pub struct ThriftConnector {
    connect_timeout: Duration,
    call_timeout: Duration,
}

impl ThriftConnector {
    /// Builds a connector. Zero durations disable the corresponding timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            call_timeout,
        }
    }

    fn open(&self, host: &str, port: u16) -> Result<(TcpStream, SocketAddr), ConnectError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                host: host.to_owned(),
                port,
                source,
            })?
            .collect();
        let mut last_error = None;
        for addr in addrs {
            let attempt = if self.connect_timeout.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(&addr, self.connect_timeout)
            };
            match attempt {
                Ok(stream) => return self.configure(stream, addr).map(|ready| (ready, addr)),
                Err(source) => last_error = Some(ConnectError::Connect { addr, source }),
            }
        }
        Err(last_error.unwrap_or_else(|| ConnectError::ResolveEmpty {
            host: host.to_owned(),
            port,
        }))
    }

    fn configure(&self, stream: TcpStream, addr: SocketAddr) -> Result<TcpStream, ConnectError> {
        let timeout = (!self.call_timeout.is_zero()).then_some(self.call_timeout);
        let configure = |source| ConnectError::Configure { addr, source };
        stream.set_read_timeout(timeout).map_err(configure)?;
        stream.set_write_timeout(timeout).map_err(configure)?;
        stream.set_nodelay(true).map_err(configure)?;
        Ok(stream)
    }
}

impl Connector for ThriftConnector {
    fn connect(&self, key: &ConnectionKey) -> Result<Box<dyn Connection>, ConnectError> {
        let (stream, addr) = self.open(&key.host, key.port)?;
        let connection =
            ThriftConnection::new(stream).map_err(|source| ConnectError::Configure { addr, source })?;
        Ok(Box::new(connection))
    }
}

/// One framed binary protocol session.
pub struct ThriftConnection {
    stream: TcpStream,
    input: TBinaryInputProtocol<TFramedReadTransport<TcpStream>>,
    output: TBinaryOutputProtocol<TFramedWriteTransport<TcpStream>>,
    sequence: i32,
}

impl ThriftConnection {
    /// Wraps a connected stream.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the stream cannot be cloned for the read and
    /// write halves.
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        let read_half = stream.try_clone()?;
        let write_half = stream.try_clone()?;
        Ok(Self {
            stream,
            input: TBinaryInputProtocol::new(TFramedReadTransport::new(read_half), true),
            output: TBinaryOutputProtocol::new(TFramedWriteTransport::new(write_half), true),
            sequence: 0,
        })
    }

    fn next_sequence(&mut self) -> i32 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    fn receive(
        &mut self,
        method: &MethodDescriptor,
        sequence: i32,
        types: &TypeTable,
    ) -> Result<StructValue, CallError> {
        let header = self.input.read_message_begin()?;
        if header.message_type == TMessageType::Exception {
            let exception = ApplicationException::read(&mut self.input)?;
            self.input.read_message_end()?;
            return Err(CallError::Application(exception));
        }
        if header.message_type != TMessageType::Reply {
            return Err(CallError::Protocol {
                message: format!("expected a reply, got {:?}", header.message_type),
            });
        }
        if header.name != method.name {
            return Err(CallError::Protocol {
                message: format!("reply names '{}', expected '{}'", header.name, method.name),
            });
        }
        if header.sequence_number != sequence {
            return Err(CallError::Protocol {
                message: format!(
                    "reply sequence {} does not match call sequence {sequence}",
                    header.sequence_number
                ),
            });
        }
        let result = read_struct(&mut self.input, &method.result, types)?;
        self.input.read_message_end()?;
        Ok(result)
    }
}

impl Connection for ThriftConnection {
    fn invoke(
        &mut self,
        method: &MethodDescriptor,
        args: &StructValue,
        types: &TypeTable,
    ) -> Result<Option<StructValue>, CallError> {
        let sequence = self.next_sequence();
        let message_type = if method.oneway {
            TMessageType::OneWay
        } else {
            TMessageType::Call
        };
        self.output.write_message_begin(&TMessageIdentifier::new(
            method.name.as_str(),
            message_type,
            sequence,
        ))?;
        write_struct(&mut self.output, args, &method.args, types)?;
        self.output.write_message_end()?;
        self.output.flush()?;
        if method.oneway {
            return Ok(None);
        }
        self.receive(method, sequence, types).map(Some)
    }

    fn close(&mut self) -> Result<(), CallError> {
        self.stream
            .shutdown(Shutdown::Both)
            .map_err(|error| CallError::Transport(thrift::Error::from(error)))
    }
}
