//! Response serialization helpers for the dispatch loop.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use super::errors::DispatchError;

/// Response line sent to clients, tagged by `kind`.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// The operation produced a body.
    Reply {
        /// Operation result.
        body: Value,
    },
    /// The file, service, or method does not exist.
    NotFound {
        /// What was missing.
        message: String,
    },
    /// The request could not be served.
    Error {
        /// One-line description.
        message: String,
    },
}

/// Writer that serializes gateway messages to a stream, one per line.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Creates a new response writer wrapping the given output stream.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a message as a JSONL line and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_message(&mut self, message: &GatewayMessage) -> Result<(), DispatchError> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes a reply line.
    ///
    /// # Errors
    ///
    /// As for [`Self::write_message`].
    pub fn write_reply(&mut self, body: Value) -> Result<(), DispatchError> {
        self.write_message(&GatewayMessage::Reply { body })
    }

    /// Writes a not-found line.
    ///
    /// # Errors
    ///
    /// As for [`Self::write_message`].
    pub fn write_not_found(&mut self, message: impl Into<String>) -> Result<(), DispatchError> {
        self.write_message(&GatewayMessage::NotFound {
            message: message.into(),
        })
    }

    /// Writes an error line.
    ///
    /// # Errors
    ///
    /// As for [`Self::write_message`].
    pub fn write_error(&mut self, message: impl Into<String>) -> Result<(), DispatchError> {
        self.write_message(&GatewayMessage::Error {
            message: message.into(),
        })
    }
}
