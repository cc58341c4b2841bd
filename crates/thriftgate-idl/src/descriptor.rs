//! Resolved, immutable descriptors produced by the loader.
//!
//! Descriptors are plain data: typedefs are already expanded, struct and
//! enum references are qualified names into the module's [`TypeTable`], and
//! every method carries synthesised argument and result structs. Struct types
//! are referenced by name rather than embedded so that recursive structs need
//! no special casing.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// Field id of the success alternative in a result struct.
pub const SUCCESS_FIELD_ID: i16 = 0;

/// Field name of the success alternative in a result struct.
pub const SUCCESS_FIELD_NAME: &str = "success";

/// Wire-level kind of a value, mirroring the Thrift type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// IEEE-754 double.
    Double,
    /// String or binary.
    String,
    /// Nested struct.
    Struct,
    /// Map.
    Map,
    /// Set.
    Set,
    /// List.
    List,
}

/// Fully resolved type of a field or container element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSpec {
    /// `bool`.
    Bool,
    /// `byte` / `i8`.
    Byte,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `double`.
    Double,
    /// `string`.
    String,
    /// `binary`.
    Binary,
    /// Enum, by qualified name; carried on the wire as `i32`.
    Enum(String),
    /// Struct, union, or exception, by qualified name.
    Struct(String),
    /// `list<T>`.
    List(Box<TypeSpec>),
    /// `set<T>`.
    Set(Box<TypeSpec>),
    /// `map<K, V>`.
    Map(Box<TypeSpec>, Box<TypeSpec>),
}

impl TypeSpec {
    /// Wire tag used when this type is serialised.
    #[must_use]
    pub const fn wire_type(&self) -> WireType {
        match self {
            Self::Bool => WireType::Bool,
            Self::Byte => WireType::Byte,
            Self::I16 => WireType::I16,
            Self::I32 | Self::Enum(_) => WireType::I32,
            Self::I64 => WireType::I64,
            Self::Double => WireType::Double,
            Self::String | Self::Binary => WireType::String,
            Self::Struct(_) => WireType::Struct,
            Self::List(_) => WireType::List,
            Self::Set(_) => WireType::Set,
            Self::Map(..) => WireType::Map,
        }
    }

    /// Rewrites every named reference as `prefix.name`.
    ///
    /// Used when types from an included file are merged into the includer's
    /// type table.
    #[must_use]
    pub fn qualified(&self, prefix: &str) -> Self {
        match self {
            Self::Enum(name) => Self::Enum(format!("{prefix}.{name}")),
            Self::Struct(name) => Self::Struct(format!("{prefix}.{name}")),
            Self::List(inner) => Self::List(Box::new(inner.qualified(prefix))),
            Self::Set(inner) => Self::Set(Box::new(inner.qualified(prefix))),
            Self::Map(key, value) => Self::Map(
                Box::new(key.qualified(prefix)),
                Box::new(value.qualified(prefix)),
            ),
            other => other.clone(),
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => formatter.write_str("bool"),
            Self::Byte => formatter.write_str("byte"),
            Self::I16 => formatter.write_str("i16"),
            Self::I32 => formatter.write_str("i32"),
            Self::I64 => formatter.write_str("i64"),
            Self::Double => formatter.write_str("double"),
            Self::String => formatter.write_str("string"),
            Self::Binary => formatter.write_str("binary"),
            Self::Enum(name) | Self::Struct(name) => formatter.write_str(name),
            Self::List(inner) => write!(formatter, "list<{inner}>"),
            Self::Set(inner) => write!(formatter, "set<{inner}>"),
            Self::Map(key, value) => write!(formatter, "map<{key}, {value}>"),
        }
    }
}

/// Requiredness keyword attached to a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Requiredness {
    /// `required`.
    Required,
    /// `optional`.
    Optional,
    /// No keyword.
    #[default]
    Default,
}

/// Literal value used for constants and field defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// Integer literal.
    Int(i64),
    /// Floating-point literal.
    Double(f64),
    /// String literal.
    String(String),
    /// `[a, b, ...]`.
    List(Vec<ConstValue>),
    /// `{k: v, ...}`.
    Map(Vec<(ConstValue, ConstValue)>),
}

impl ConstValue {
    /// Renders the literal as an untyped JSON tree.
    ///
    /// Maps render as `{key, value}` pair arrays so that non-string keys
    /// survive.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(value) => serde_json::Value::from(*value),
            Self::Double(value) => serde_json::Value::from(*value),
            Self::String(value) => serde_json::Value::from(value.as_str()),
            Self::List(items) => items.iter().map(Self::to_json).collect(),
            Self::Map(entries) => entries
                .iter()
                .map(|(key, value)| {
                    let mut pair = serde_json::Map::new();
                    pair.insert("key".to_owned(), key.to_json());
                    pair.insert("value".to_owned(), value.to_json());
                    serde_json::Value::Object(pair)
                })
                .collect(),
        }
    }
}

/// One field of a struct, argument list, or result.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field id, unique within the enclosing struct.
    pub id: i16,
    /// Field name.
    pub name: String,
    /// Resolved type.
    pub ty: TypeSpec,
    /// Requiredness keyword.
    pub requiredness: Requiredness,
    /// Declared default, if any.
    pub default: Option<ConstValue>,
}

impl FieldSpec {
    /// Wire tag of the field's type.
    #[must_use]
    pub const fn wire_type(&self) -> WireType {
        self.ty.wire_type()
    }
}

/// Flavour of a struct-shaped declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    /// `struct`.
    Struct,
    /// `union`.
    Union,
    /// `exception`.
    Exception,
    /// Synthesised `<method>_args`.
    Arguments,
    /// Synthesised `<method>_result`.
    Result,
}

/// Ordered set of fields describing a struct-shaped value.
#[derive(Debug, Clone, PartialEq)]
pub struct StructSpec {
    /// Qualified struct name.
    pub name: String,
    /// Declaration flavour.
    pub kind: StructKind,
    /// Fields in declaration order.
    pub fields: Vec<FieldSpec>,
}

impl StructSpec {
    /// Looks a field up by id.
    #[must_use]
    pub fn field(&self, id: i16) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// Fields sorted by ascending id, the emission order of encoded structs.
    #[must_use]
    pub fn fields_by_id(&self) -> Vec<&FieldSpec> {
        let mut fields: Vec<&FieldSpec> = self.fields.iter().collect();
        fields.sort_by_key(|field| field.id);
        fields
    }

    /// Copy with every type reference qualified by `prefix`.
    #[must_use]
    pub fn qualified(&self, prefix: &str) -> Self {
        let name = match self.kind {
            StructKind::Arguments | StructKind::Result => self.name.clone(),
            StructKind::Struct | StructKind::Union | StructKind::Exception => {
                format!("{prefix}.{}", self.name)
            }
        };
        Self {
            name,
            kind: self.kind,
            fields: self
                .fields
                .iter()
                .map(|field| FieldSpec {
                    ty: field.ty.qualified(prefix),
                    ..field.clone()
                })
                .collect(),
        }
    }
}

/// Enum declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSpec {
    /// Qualified enum name.
    pub name: String,
    /// Members in declaration order.
    pub members: IndexMap<String, i32>,
}

impl EnumSpec {
    /// Value of the named member.
    #[must_use]
    pub fn value_of(&self, member: &str) -> Option<i32> {
        self.members.get(member).copied()
    }
}

/// Struct and enum declarations reachable from a module, by qualified name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeTable {
    structs: IndexMap<String, StructSpec>,
    enums: IndexMap<String, EnumSpec>,
}

impl TypeTable {
    /// Looks up a struct, union, or exception.
    #[must_use]
    pub fn struct_spec(&self, name: &str) -> Option<&StructSpec> {
        self.structs.get(name)
    }

    /// Looks up an enum.
    #[must_use]
    pub fn enum_spec(&self, name: &str) -> Option<&EnumSpec> {
        self.enums.get(name)
    }

    /// Iterates struct declarations.
    pub fn structs(&self) -> impl Iterator<Item = &StructSpec> {
        self.structs.values()
    }

    /// Iterates enum declarations.
    pub fn enums(&self) -> impl Iterator<Item = &EnumSpec> {
        self.enums.values()
    }

    pub(crate) fn insert_struct(&mut self, spec: StructSpec) {
        self.structs.insert(spec.name.clone(), spec);
    }

    pub(crate) fn insert_enum(&mut self, spec: EnumSpec) {
        self.enums.insert(spec.name.clone(), spec);
    }

    pub(crate) fn merge_qualified(&mut self, prefix: &str, other: &Self) {
        for spec in other.structs.values() {
            self.insert_struct(spec.qualified(prefix));
        }
        for spec in other.enums.values() {
            self.insert_enum(EnumSpec {
                name: format!("{prefix}.{}", spec.name),
                members: spec.members.clone(),
            });
        }
    }
}

/// One RPC method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    /// Method name.
    pub name: String,
    /// Whether the method is `oneway` (no reply is read).
    pub oneway: bool,
    /// Synthesised `<name>_args` struct.
    pub args: StructSpec,
    /// Synthesised `<name>_result` struct: `success` (id 0, absent for
    /// `void`) plus one field per declared exception.
    pub result: StructSpec,
}

impl MethodDescriptor {
    /// The success alternative, absent for `void` and `oneway` methods.
    #[must_use]
    pub fn success_field(&self) -> Option<&FieldSpec> {
        self.result.field(SUCCESS_FIELD_ID)
    }

    /// Declared exception alternatives.
    pub fn exception_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.result
            .fields
            .iter()
            .filter(|field| field.id != SUCCESS_FIELD_ID)
    }

    /// Copy with every type reference qualified by `prefix`.
    #[must_use]
    pub fn qualified(&self, prefix: &str) -> Self {
        Self {
            name: self.name.clone(),
            oneway: self.oneway,
            args: self.args.qualified(prefix),
            result: self.result.qualified(prefix),
        }
    }
}

/// A named group of methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    /// Service name.
    pub name: String,
    /// Parent service as written in `extends`, if any.
    pub extends: Option<String>,
    /// Methods, inherited ones first, in declaration order.
    pub methods: IndexMap<String, MethodDescriptor>,
}

impl ServiceDescriptor {
    /// Looks up a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// Whether the service declares or inherits `name`.
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }
}

/// A parsed and resolved schema file.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    /// File stem, used as the qualification prefix by includers.
    pub name: String,
    /// File the module was loaded from.
    pub path: PathBuf,
    /// `namespace` declarations by scope.
    pub namespaces: IndexMap<String, String>,
    /// `include` targets as written.
    pub includes: Vec<String>,
    /// Files read through includes, transitively, as located on disk.
    pub dependencies: Vec<PathBuf>,
    /// Constants declared in this file.
    pub constants: IndexMap<String, ConstValue>,
    /// Typedefs declared in this file, already expanded.
    pub typedefs: IndexMap<String, TypeSpec>,
    /// Services declared in this file.
    pub services: IndexMap<String, ServiceDescriptor>,
    /// Types declared here and in included files.
    pub types: TypeTable,
}

impl ModuleDescriptor {
    /// Looks up a service by name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    /// Source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
