//! Thrift IDL loading for thriftgate.
//!
//! [`SchemaLoader::load`] parses a schema file and everything it includes
//! into a [`ModuleDescriptor`]: services with their flattened method sets,
//! synthesised argument and result structs, and a [`TypeTable`] holding every
//! struct and enum the module can reach. Types from included files are named
//! `prefix.Name`, the prefix being the include's file stem.

mod descriptor;
mod error;
mod loader;
mod parser;

pub use descriptor::{
    ConstValue, EnumSpec, FieldSpec, MethodDescriptor, ModuleDescriptor, Requiredness,
    SUCCESS_FIELD_ID, SUCCESS_FIELD_NAME, ServiceDescriptor, StructKind, StructSpec, TypeSpec,
    TypeTable, WireType,
};
pub use error::{IdlError, SyntaxError};
pub use loader::SchemaLoader;
