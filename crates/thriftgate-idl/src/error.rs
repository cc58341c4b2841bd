//! Errors raised while loading schema files.
//!
//! Every variant names the file it concerns so the indexer can log a single
//! actionable line per rejected schema.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Position-tagged syntax error produced by the lexer and parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct SyntaxError {
    /// One-based line of the offending token.
    pub line: u32,
    /// One-based column of the offending token.
    pub column: u32,
    /// Description of what was expected or found.
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Errors arising while reading, parsing, or resolving a schema file.
#[derive(Debug, Clone, Error)]
pub enum IdlError {
    /// The file could not be read.
    #[error("failed to read schema '{path}': {source}")]
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The file is not valid IDL.
    #[error("syntax error in '{path}' at {source}")]
    Syntax {
        /// File containing the error.
        path: PathBuf,
        /// Position and description.
        #[source]
        source: SyntaxError,
    },

    /// An `include` names a file that exists in no search directory.
    #[error("'{path}' includes '{include}', which was not found")]
    IncludeNotFound {
        /// Including file.
        path: PathBuf,
        /// Include target as written.
        include: String,
    },

    /// Includes form a cycle.
    #[error("include cycle through '{path}'")]
    IncludeCycle {
        /// File reached twice on the include stack.
        path: PathBuf,
    },

    /// Two includes of one file share a file stem, so their qualified names
    /// would collide.
    #[error("'{path}' includes both '{first}' and '{second}' as '{namespace}'")]
    IncludeNameClash {
        /// Including file.
        path: PathBuf,
        /// Shared qualification prefix.
        namespace: String,
        /// Include bound to the prefix first.
        first: String,
        /// Include that would shadow it.
        second: String,
    },

    /// A type reference names nothing declared or included.
    #[error("unknown type '{name}' in '{path}'")]
    UnknownType {
        /// File containing the reference.
        path: PathBuf,
        /// Unresolved type name.
        name: String,
    },

    /// A constant reference names nothing declared or included.
    #[error("unknown constant '{name}' in '{path}'")]
    UnknownConstant {
        /// File containing the reference.
        path: PathBuf,
        /// Unresolved constant name.
        name: String,
    },

    /// A service `extends` a service that does not exist.
    #[error("service '{service}' extends unknown service '{parent}' in '{path}'")]
    UnknownParentService {
        /// File declaring the service.
        path: PathBuf,
        /// Extending service.
        service: String,
        /// Missing parent.
        parent: String,
    },

    /// Two fields of one struct share an id.
    #[error("duplicate field id {id} in '{structure}' ('{path}')")]
    DuplicateFieldId {
        /// File declaring the struct.
        path: PathBuf,
        /// Struct, argument list, or throws clause.
        structure: String,
        /// Repeated id.
        id: i16,
    },

    /// A name is declared twice in one file.
    #[error("duplicate definition '{name}' in '{path}'")]
    DuplicateDefinition {
        /// File declaring the name.
        path: PathBuf,
        /// Repeated name.
        name: String,
    },

    /// Typedefs refer to each other without reaching a concrete type.
    #[error("typedef cycle through '{name}' in '{path}'")]
    TypedefCycle {
        /// File declaring the typedef.
        path: PathBuf,
        /// Typedef on the cycle.
        name: String,
    },

    /// A `throws` clause names something that is not a struct type.
    #[error("method '{method}' throws non-struct type '{name}' in '{path}'")]
    InvalidThrows {
        /// File declaring the method.
        path: PathBuf,
        /// Method name.
        method: String,
        /// Offending type.
        name: String,
    },
}

impl IdlError {
    /// Path of the file the error concerns.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. }
            | Self::Syntax { path, .. }
            | Self::IncludeNotFound { path, .. }
            | Self::IncludeCycle { path }
            | Self::IncludeNameClash { path, .. }
            | Self::UnknownType { path, .. }
            | Self::UnknownConstant { path, .. }
            | Self::UnknownParentService { path, .. }
            | Self::DuplicateFieldId { path, .. }
            | Self::DuplicateDefinition { path, .. }
            | Self::TypedefCycle { path, .. }
            | Self::InvalidThrows { path, .. } => path,
        }
    }
}
