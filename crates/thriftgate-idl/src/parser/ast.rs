//! Unresolved syntax tree of one IDL document.

use crate::descriptor::{Requiredness, StructKind};

#[derive(Debug, Default)]
pub(crate) struct Document {
    pub(crate) includes: Vec<String>,
    pub(crate) namespaces: Vec<(String, String)>,
    pub(crate) definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TypeRef {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    Binary,
    Named(String),
    List(Box<TypeRef>),
    Set(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Int(i64),
    Double(f64),
    Str(String),
    Ident(String),
    List(Vec<Literal>),
    Map(Vec<(Literal, Literal)>),
}

#[derive(Debug, Clone)]
pub(crate) struct FieldDecl {
    pub(crate) id: Option<i16>,
    pub(crate) requiredness: Requiredness,
    pub(crate) ty: TypeRef,
    pub(crate) name: String,
    pub(crate) default: Option<Literal>,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionDecl {
    pub(crate) name: String,
    pub(crate) oneway: bool,
    /// `None` for `void`.
    pub(crate) returns: Option<TypeRef>,
    pub(crate) args: Vec<FieldDecl>,
    pub(crate) throws: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub(crate) enum Definition {
    Const {
        name: String,
        ty: TypeRef,
        value: Literal,
    },
    Typedef {
        name: String,
        ty: TypeRef,
    },
    Enum {
        name: String,
        members: Vec<(String, Option<i32>)>,
    },
    Struct {
        name: String,
        kind: StructKind,
        fields: Vec<FieldDecl>,
    },
    Service {
        name: String,
        extends: Option<String>,
        functions: Vec<FunctionDecl>,
    },
}

impl Definition {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Const { name, .. }
            | Self::Typedef { name, .. }
            | Self::Enum { name, .. }
            | Self::Struct { name, .. }
            | Self::Service { name, .. } => name,
        }
    }
}
