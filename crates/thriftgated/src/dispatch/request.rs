//! Request deserialization for the dispatch loop.
//!
//! A request line is read as a JSON object first so the `operation` field
//! can pick the typed request it deserializes into.

use serde::Deserialize;
use serde_json::Value;

use super::errors::RequestError;
use crate::gateway::{CallRequest, WILDCARD};

/// Arguments of a `list` request.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ListRequest {
    /// One file to list; every parsed file when absent.
    #[serde(default)]
    pub file: Option<String>,
}

/// Arguments of a `sample` request.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct SampleRequest {
    /// Schema file pattern.
    #[serde(default = "wildcard")]
    pub file: String,
    /// Service pattern.
    #[serde(default = "wildcard")]
    pub service: String,
    /// Method name.
    pub method: String,
}

fn wildcard() -> String {
    WILDCARD.to_owned()
}

/// Parsed request from a client.
#[derive(Debug, PartialEq)]
pub enum GatewayRequest {
    /// Invoke a remote method.
    Call(CallRequest),
    /// Enumerate indexed services.
    List(ListRequest),
    /// Generate sample payloads.
    Sample(SampleRequest),
}

impl GatewayRequest {
    /// Parses a JSONL line into a request.
    ///
    /// Trailing whitespace (including the newline delimiter) is trimmed
    /// before parsing.
    ///
    /// # Errors
    ///
    /// `Malformed` for empty lines and invalid JSON, `Structure` for a
    /// missing operation or fields that do not fit it, and
    /// `UnknownOperation` for anything but `call`, `list`, or `sample`.
    pub fn parse(line: &[u8]) -> Result<Self, RequestError> {
        let trimmed = line.trim_ascii_end();
        if trimmed.is_empty() {
            return Err(RequestError::Malformed("empty request line".to_owned()));
        }

        let value: Value = serde_json::from_slice(trimmed)
            .map_err(|error| RequestError::Malformed(error.to_string()))?;
        let operation = value
            .get("operation")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|operation| !operation.is_empty())
            .ok_or_else(|| RequestError::structure("operation field is missing or empty"))?
            .to_owned();
        match operation.as_str() {
            "call" => typed(value).map(Self::Call),
            "list" => typed(value).map(Self::List),
            "sample" => typed(value).map(Self::Sample),
            _ => Err(RequestError::UnknownOperation(operation)),
        }
    }

    /// Operation name, for logging.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Call(_) => "call",
            Self::List(_) => "list",
            Self::Sample(_) => "sample",
        }
    }
}

fn typed<T>(value: Value) -> Result<T, RequestError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(value).map_err(RequestError::structure)
}
