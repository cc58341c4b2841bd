//! Errors raised while converting values.

use thiserror::Error;

/// Conversion failure, tagged with the dotted path of the offending value
/// (`args.items[2].key`).
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value's shape does not fit the declared type.
    #[error("{path}: expected {expected}, found {found}")]
    Mismatch {
        /// Location of the value.
        path: String,
        /// Declared type.
        expected: String,
        /// Description of what was supplied.
        found: String,
    },

    /// A string names no member of the declared enum.
    #[error("{path}: '{member}' is not a member of enum '{name}'")]
    UnknownEnumMember {
        /// Location of the value.
        path: String,
        /// Enum type.
        name: String,
        /// Supplied member name.
        member: String,
    },

    /// A struct or enum reference is missing from the type table.
    #[error("{path}: type '{name}' is not declared")]
    UnknownType {
        /// Location of the value.
        path: String,
        /// Missing type.
        name: String,
    },

    /// A collection holds more elements than the wire format can count.
    #[error("{path}: {count} elements exceed the wire limit")]
    TooLarge {
        /// Location of the collection.
        path: String,
        /// Element count.
        count: usize,
    },

    /// The protocol or transport failed.
    #[error("wire error: {0}")]
    Wire(#[from] thrift::Error),
}

impl CodecError {
    pub(crate) fn mismatch(path: &str, expected: impl ToString, found: impl Into<String>) -> Self {
        Self::Mismatch {
            path: path.to_owned(),
            expected: expected.to_string(),
            found: found.into(),
        }
    }

    pub(crate) fn unknown_type(path: &str, name: &str) -> Self {
        Self::UnknownType {
            path: path.to_owned(),
            name: name.to_owned(),
        }
    }
}
