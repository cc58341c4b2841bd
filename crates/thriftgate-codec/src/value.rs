//! Schema-typed values.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};
use thriftgate_idl::{StructSpec, TypeTable};

use crate::decode::decode_at;
use crate::error::CodecError;

/// A value carrying its Thrift type.
///
/// Doubles compare and hash by bit pattern so that every value can be a set
/// element or a map key. Sets and maps keep insertion order; their equality
/// ignores order.
#[derive(Debug, Clone)]
pub enum TypedValue {
    /// `bool`.
    Bool(bool),
    /// `byte`.
    Byte(i8),
    /// `i16`.
    I16(i16),
    /// `i32`.
    I32(i32),
    /// `i64`.
    I64(i64),
    /// `double`.
    Double(f64),
    /// `string`.
    String(String),
    /// `binary`.
    Binary(Vec<u8>),
    /// Enum member, by value.
    Enum(i32),
    /// Struct, union, or exception.
    Struct(StructValue),
    /// `list<T>`.
    List(Vec<TypedValue>),
    /// `set<T>`.
    Set(IndexSet<TypedValue>),
    /// `map<K, V>`.
    Map(IndexMap<TypedValue, TypedValue>),
}

impl TypedValue {
    /// Integer payload of any integer-shaped variant.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Byte(value) => Some(i64::from(*value)),
            Self::I16(value) => Some(i64::from(*value)),
            Self::I32(value) | Self::Enum(value) => Some(i64::from(*value)),
            Self::I64(value) => Some(*value),
            _ => None,
        }
    }

    /// Short name of the variant, used in mismatch errors.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Byte(_) => "byte",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Enum(_) => "enum",
            Self::Struct(_) => "struct",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Byte(left), Self::Byte(right)) => left == right,
            (Self::I16(left), Self::I16(right)) => left == right,
            (Self::I32(left), Self::I32(right)) | (Self::Enum(left), Self::Enum(right)) => {
                left == right
            }
            (Self::I64(left), Self::I64(right)) => left == right,
            (Self::Double(left), Self::Double(right)) => left.to_bits() == right.to_bits(),
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Binary(left), Self::Binary(right)) => left == right,
            (Self::Struct(left), Self::Struct(right)) => left == right,
            (Self::List(left), Self::List(right)) => left == right,
            (Self::Set(left), Self::Set(right)) => left == right,
            (Self::Map(left), Self::Map(right)) => left == right,
            _ => false,
        }
    }
}

impl Eq for TypedValue {}

impl Hash for TypedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(value) => value.hash(state),
            Self::Byte(value) => value.hash(state),
            Self::I16(value) => value.hash(state),
            Self::I32(value) | Self::Enum(value) => value.hash(state),
            Self::I64(value) => value.hash(state),
            Self::Double(value) => value.to_bits().hash(state),
            Self::String(value) => value.hash(state),
            Self::Binary(value) => value.hash(state),
            Self::Struct(value) => value.hash(state),
            Self::List(items) => items.hash(state),
            // Order-insensitive equality; hashing the size keeps the two
            // consistent.
            Self::Set(items) => items.len().hash(state),
            Self::Map(entries) => entries.len().hash(state),
        }
    }
}

/// A struct instance: the fields that are set, keyed by field id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructValue {
    name: String,
    fields: BTreeMap<i16, TypedValue>,
}

impl StructValue {
    /// A struct named `name` with no fields set.
    #[must_use]
    pub fn zeroed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// A struct of shape `spec` with every declared default applied.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when a declared default does not fit its
    /// field's type.
    pub fn with_defaults(spec: &StructSpec, types: &TypeTable) -> Result<Self, CodecError> {
        let mut value = Self::zeroed(spec.name.as_str());
        for field in &spec.fields {
            if let Some(default) = &field.default {
                let path = format!("{}.{}", spec.name, field.name);
                value.set(field.id, decode_at(&default.to_json(), &field.ty, types, &path)?);
            }
        }
        Ok(value)
    }

    /// Struct name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of field `id`, if set.
    #[must_use]
    pub fn get(&self, id: i16) -> Option<&TypedValue> {
        self.fields.get(&id)
    }

    /// Whether field `id` is set.
    #[must_use]
    pub fn is_set(&self, id: i16) -> bool {
        self.fields.contains_key(&id)
    }

    /// Sets field `id`, replacing any previous value.
    pub fn set(&mut self, id: i16, value: TypedValue) {
        self.fields.insert(id, value);
    }

    /// Unsets field `id`, returning its value.
    pub fn take(&mut self, id: i16) -> Option<TypedValue> {
        self.fields.remove(&id)
    }

    /// Set fields in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (i16, &TypedValue)> {
        self.fields.iter().map(|(id, value)| (*id, value))
    }

    /// Number of set fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
