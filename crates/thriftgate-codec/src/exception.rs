//! Protocol-level application exceptions.

use serde_json::{Value, json};
use thiserror::Error;
use thrift::{ApplicationError, ApplicationErrorKind};
use thrift::protocol::{TInputProtocol, TOutputProtocol};

use crate::error::CodecError;

/// Standard application exception kinds and their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// 0.
    Unknown,
    /// 1.
    UnknownMethod,
    /// 2.
    InvalidMessageType,
    /// 3.
    WrongMethodName,
    /// 4.
    BadSequenceId,
    /// 5.
    MissingResult,
    /// 6.
    InternalError,
    /// 7.
    ProtocolError,
}

impl ExceptionKind {
    /// Wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::UnknownMethod => 1,
            Self::InvalidMessageType => 2,
            Self::WrongMethodName => 3,
            Self::BadSequenceId => 4,
            Self::MissingResult => 5,
            Self::InternalError => 6,
            Self::ProtocolError => 7,
        }
    }

    /// Kind for a wire code; codes outside the standard set map to
    /// [`Self::Unknown`].
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::UnknownMethod,
            2 => Self::InvalidMessageType,
            3 => Self::WrongMethodName,
            4 => Self::BadSequenceId,
            5 => Self::MissingResult,
            6 => Self::InternalError,
            7 => Self::ProtocolError,
            _ => Self::Unknown,
        }
    }
}

impl From<ApplicationErrorKind> for ExceptionKind {
    fn from(kind: ApplicationErrorKind) -> Self {
        Self::from_code(kind as i32)
    }
}

impl From<ExceptionKind> for ApplicationErrorKind {
    fn from(kind: ExceptionKind) -> Self {
        match kind {
            ExceptionKind::Unknown => Self::Unknown,
            ExceptionKind::UnknownMethod => Self::UnknownMethod,
            ExceptionKind::InvalidMessageType => Self::InvalidMessageType,
            ExceptionKind::WrongMethodName => Self::WrongMethodName,
            ExceptionKind::BadSequenceId => Self::BadSequenceId,
            ExceptionKind::MissingResult => Self::MissingResult,
            ExceptionKind::InternalError => Self::InternalError,
            ExceptionKind::ProtocolError => Self::ProtocolError,
        }
    }
}

/// An exception raised by the RPC layer rather than declared by a method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApplicationException {
    /// Exception kind.
    pub kind: ExceptionKind,
    /// Human-readable description.
    pub message: String,
}

impl ApplicationException {
    /// Builds an exception.
    #[must_use]
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// An [`ExceptionKind::InternalError`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::InternalError, message)
    }

    /// An [`ExceptionKind::Unknown`], the kind used for transport failures.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Unknown, message)
    }

    /// `{"message": ..., "type": <code>}`, the shape generated clients use.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "message": self.message,
            "type": self.kind.code(),
        })
    }

    /// Reads an exception body following an `Exception` message header.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the protocol fails.
    pub fn read(input: &mut dyn TInputProtocol) -> Result<Self, CodecError> {
        Ok(thrift::Error::read_application_error_from_in_protocol(input)?.into())
    }

    /// Writes the exception body after an `Exception` message header.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the protocol fails.
    pub fn write(&self, output: &mut dyn TOutputProtocol) -> Result<(), CodecError> {
        let error = ApplicationError::new(self.kind.into(), self.message.clone());
        thrift::Error::write_application_error_to_out_protocol(&error, output)?;
        Ok(())
    }
}

impl From<ApplicationError> for ApplicationException {
    fn from(error: ApplicationError) -> Self {
        Self::new(error.kind.into(), error.message)
    }
}
