//! Value translation for thriftgate.
//!
//! Converts untyped JSON trees to schema-typed [`TypedValue`]s and back,
//! moves typed structs through Thrift protocols, and generates deterministic
//! sample payloads. Every function takes the [`thriftgate_idl::TypeTable`] of
//! the module the schema came from so struct and enum references resolve.

mod decode;
mod encode;
mod error;
mod exception;
mod narrow;
mod sample;
mod value;
mod wire;

pub use decode::{decode, decode_struct};
pub use encode::{encode, encode_struct};
pub use error::CodecError;
pub use exception::{ApplicationException, ExceptionKind};
pub use sample::generate_sample;
pub use value::{StructValue, TypedValue};
pub use wire::{read_struct, ttype, write_struct};
