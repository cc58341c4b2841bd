//! Turns a parsed document plus its loaded includes into a descriptor.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::descriptor::{
    ConstValue, EnumSpec, FieldSpec, MethodDescriptor, ModuleDescriptor, Requiredness,
    SUCCESS_FIELD_ID, SUCCESS_FIELD_NAME, ServiceDescriptor, StructKind, StructSpec, TypeSpec,
    TypeTable,
};
use crate::error::IdlError;
use crate::parser::ast::{Definition, Document, FieldDecl, FunctionDecl, Literal, TypeRef};

/// Included modules keyed by the prefix their types are referenced with.
pub(super) type Includes = IndexMap<String, Arc<ModuleDescriptor>>;

pub(super) fn resolve_module(
    name: String,
    path: &Path,
    document: &Document,
    includes: &Includes,
) -> Result<ModuleDescriptor, IdlError> {
    let resolver = Resolver::new(path, document, includes)?;

    let typedefs = resolver.typedefs()?;
    let constants = resolver.constants()?;

    let mut types = TypeTable::default();
    for spec in resolver.enums.values() {
        types.insert_enum(spec.clone());
    }
    for spec in resolver.structs()? {
        types.insert_struct(spec);
    }
    for (prefix, module) in includes {
        types.merge_qualified(prefix, &module.types);
    }

    let services = resolver.services()?;

    let mut dependencies: Vec<PathBuf> = Vec::new();
    for module in includes.values() {
        let reached = std::iter::once(module.path())
            .chain(module.dependencies.iter().map(PathBuf::as_path));
        for dependency in reached {
            if !dependencies.iter().any(|known| known == dependency) {
                dependencies.push(dependency.to_path_buf());
            }
        }
    }

    Ok(ModuleDescriptor {
        name,
        path: path.to_path_buf(),
        namespaces: document.namespaces.iter().cloned().collect(),
        includes: document.includes.clone(),
        dependencies,
        constants,
        typedefs,
        services,
        types,
    })
}

struct Resolver<'a> {
    path: &'a Path,
    includes: &'a Includes,
    typedefs: IndexMap<&'a str, &'a TypeRef>,
    consts: IndexMap<&'a str, &'a Literal>,
    struct_decls: IndexMap<&'a str, (StructKind, &'a [FieldDecl])>,
    service_decls: IndexMap<&'a str, (Option<&'a str>, &'a [FunctionDecl])>,
    enums: IndexMap<String, EnumSpec>,
}

impl<'a> Resolver<'a> {
    fn new(path: &'a Path, document: &'a Document, includes: &'a Includes) -> Result<Self, IdlError> {
        let mut resolver = Self {
            path,
            includes,
            typedefs: IndexMap::new(),
            consts: IndexMap::new(),
            struct_decls: IndexMap::new(),
            service_decls: IndexMap::new(),
            enums: IndexMap::new(),
        };
        let mut seen = HashSet::new();
        for definition in &document.definitions {
            if !seen.insert(definition.name()) {
                return Err(resolver.duplicate(definition.name()));
            }
            resolver.register(definition)?;
        }
        Ok(resolver)
    }

    fn register(&mut self, definition: &'a Definition) -> Result<(), IdlError> {
        match definition {
            Definition::Const { name, value, .. } => {
                self.consts.insert(name, value);
            }
            Definition::Typedef { name, ty } => {
                self.typedefs.insert(name, ty);
            }
            Definition::Enum { name, members } => {
                let spec = self.enumeration(name, members)?;
                self.enums.insert(name.clone(), spec);
            }
            Definition::Struct { name, kind, fields } => {
                self.struct_decls.insert(name, (*kind, fields.as_slice()));
            }
            Definition::Service {
                name,
                extends,
                functions,
            } => {
                self.service_decls
                    .insert(name, (extends.as_deref(), functions.as_slice()));
            }
        }
        Ok(())
    }

    fn enumeration(
        &self,
        name: &str,
        members: &[(String, Option<i32>)],
    ) -> Result<EnumSpec, IdlError> {
        let mut values = IndexMap::new();
        let mut next = 0_i32;
        for (member, explicit) in members {
            let value = explicit.unwrap_or(next);
            if values.insert(member.clone(), value).is_some() {
                return Err(self.duplicate(&format!("{name}.{member}")));
            }
            next = value.wrapping_add(1);
        }
        Ok(EnumSpec {
            name: name.to_owned(),
            members: values,
        })
    }

    fn typedefs(&self) -> Result<IndexMap<String, TypeSpec>, IdlError> {
        self.typedefs
            .iter()
            .map(|(name, ty)| {
                let mut visiting = vec![*name];
                Ok(((*name).to_owned(), self.resolve_type_in(ty, &mut visiting)?))
            })
            .collect()
    }

    fn constants(&self) -> Result<IndexMap<String, ConstValue>, IdlError> {
        self.consts
            .iter()
            .map(|(name, literal)| {
                let mut visiting = vec![*name];
                Ok(((*name).to_owned(), self.literal_in(literal, &mut visiting)?))
            })
            .collect()
    }

    fn structs(&self) -> Result<Vec<StructSpec>, IdlError> {
        self.struct_decls
            .iter()
            .map(|(name, (kind, fields))| {
                Ok(StructSpec {
                    name: (*name).to_owned(),
                    kind: *kind,
                    fields: self.fields(name, fields)?,
                })
            })
            .collect()
    }

    fn services(&self) -> Result<IndexMap<String, ServiceDescriptor>, IdlError> {
        self.service_decls
            .keys()
            .map(|name| {
                let mut visiting = Vec::new();
                Ok(((*name).to_owned(), self.service(*name, &mut visiting)?))
            })
            .collect()
    }

    fn service(&self, name: &'a str, visiting: &mut Vec<&'a str>) -> Result<ServiceDescriptor, IdlError> {
        let Some((extends, functions)) = self.service_decls.get(name).copied() else {
            return Err(IdlError::UnknownType {
                path: self.path.to_path_buf(),
                name: name.to_owned(),
            });
        };
        visiting.push(name);
        let mut methods = match extends {
            Some(parent) => self.parent_methods(name, parent, visiting)?,
            None => IndexMap::new(),
        };
        visiting.pop();

        let mut own = HashSet::new();
        for function in functions {
            if !own.insert(function.name.as_str()) {
                return Err(self.duplicate(&format!("{name}.{}", function.name)));
            }
            methods.insert(function.name.clone(), self.method(function)?);
        }
        Ok(ServiceDescriptor {
            name: name.to_owned(),
            extends: extends.map(str::to_owned),
            methods,
        })
    }

    fn parent_methods(
        &self,
        service: &str,
        parent: &'a str,
        visiting: &mut Vec<&'a str>,
    ) -> Result<IndexMap<String, MethodDescriptor>, IdlError> {
        let unknown = || IdlError::UnknownParentService {
            path: self.path.to_path_buf(),
            service: service.to_owned(),
            parent: parent.to_owned(),
        };
        if self.service_decls.contains_key(parent) {
            if visiting.contains(&parent) {
                return Err(unknown());
            }
            return Ok(self.service(parent, visiting)?.methods);
        }
        let (prefix, rest) = parent.split_once('.').ok_or_else(unknown)?;
        let descriptor = self
            .includes
            .get(prefix)
            .and_then(|module| module.service(rest))
            .ok_or_else(unknown)?;
        Ok(descriptor
            .methods
            .iter()
            .map(|(method, descriptor)| (method.clone(), descriptor.qualified(prefix)))
            .collect())
    }

    fn method(&self, function: &FunctionDecl) -> Result<MethodDescriptor, IdlError> {
        let args = StructSpec {
            name: format!("{}_args", function.name),
            kind: StructKind::Arguments,
            fields: self.fields(&function.name, &function.args)?,
        };

        let result_name = format!("{}_result", function.name);
        let mut fields = Vec::new();
        if !function.oneway {
            if let Some(returns) = &function.returns {
                fields.push(FieldSpec {
                    id: SUCCESS_FIELD_ID,
                    name: SUCCESS_FIELD_NAME.to_owned(),
                    ty: self.resolve_type(returns)?,
                    requiredness: Requiredness::Default,
                    default: None,
                });
            }
        }
        for field in self.fields(&result_name, &function.throws)? {
            if !matches!(field.ty, TypeSpec::Struct(_)) {
                return Err(IdlError::InvalidThrows {
                    path: self.path.to_path_buf(),
                    method: function.name.clone(),
                    name: field.ty.to_string(),
                });
            }
            if fields.iter().any(|existing: &FieldSpec| existing.id == field.id) {
                return Err(IdlError::DuplicateFieldId {
                    path: self.path.to_path_buf(),
                    structure: result_name,
                    id: field.id,
                });
            }
            fields.push(field);
        }

        Ok(MethodDescriptor {
            name: function.name.clone(),
            oneway: function.oneway,
            args,
            result: StructSpec {
                name: result_name,
                kind: StructKind::Result,
                fields,
            },
        })
    }

    /// Resolves a field list, assigning implicit ids -1, -2, ... in order.
    fn fields(&self, owner: &str, decls: &[FieldDecl]) -> Result<Vec<FieldSpec>, IdlError> {
        let mut next_implicit = -1_i16;
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        let mut fields = Vec::with_capacity(decls.len());
        for decl in decls {
            let id = decl.id.unwrap_or_else(|| {
                let assigned = next_implicit;
                next_implicit = next_implicit.saturating_sub(1);
                assigned
            });
            if !ids.insert(id) {
                return Err(IdlError::DuplicateFieldId {
                    path: self.path.to_path_buf(),
                    structure: owner.to_owned(),
                    id,
                });
            }
            if !names.insert(decl.name.as_str()) {
                return Err(self.duplicate(&format!("{owner}.{}", decl.name)));
            }
            let default = decl
                .default
                .as_ref()
                .map(|literal| self.literal_in(literal, &mut Vec::new()))
                .transpose()?;
            fields.push(FieldSpec {
                id,
                name: decl.name.clone(),
                ty: self.resolve_type(&decl.ty)?,
                requiredness: decl.requiredness,
                default,
            });
        }
        Ok(fields)
    }

    fn resolve_type(&self, ty: &TypeRef) -> Result<TypeSpec, IdlError> {
        self.resolve_type_in(ty, &mut Vec::new())
    }

    fn resolve_type_in(
        &self,
        ty: &TypeRef,
        visiting: &mut Vec<&'a str>,
    ) -> Result<TypeSpec, IdlError> {
        Ok(match ty {
            TypeRef::Bool => TypeSpec::Bool,
            TypeRef::Byte => TypeSpec::Byte,
            TypeRef::I16 => TypeSpec::I16,
            TypeRef::I32 => TypeSpec::I32,
            TypeRef::I64 => TypeSpec::I64,
            TypeRef::Double => TypeSpec::Double,
            TypeRef::String => TypeSpec::String,
            TypeRef::Binary => TypeSpec::Binary,
            TypeRef::List(inner) => TypeSpec::List(Box::new(self.resolve_type_in(inner, visiting)?)),
            TypeRef::Set(inner) => TypeSpec::Set(Box::new(self.resolve_type_in(inner, visiting)?)),
            TypeRef::Map(key, value) => TypeSpec::Map(
                Box::new(self.resolve_type_in(key, visiting)?),
                Box::new(self.resolve_type_in(value, visiting)?),
            ),
            TypeRef::Named(name) => return self.named_type(name, visiting),
        })
    }

    fn named_type(&self, name: &str, visiting: &mut Vec<&'a str>) -> Result<TypeSpec, IdlError> {
        if self.struct_decls.contains_key(name) {
            return Ok(TypeSpec::Struct(name.to_owned()));
        }
        if self.enums.contains_key(name) {
            return Ok(TypeSpec::Enum(name.to_owned()));
        }
        if let Some((key, ty)) = self.typedefs.get_key_value(name) {
            if visiting.contains(key) {
                return Err(IdlError::TypedefCycle {
                    path: self.path.to_path_buf(),
                    name: name.to_owned(),
                });
            }
            visiting.push(*key);
            let resolved = self.resolve_type_in(ty, visiting);
            visiting.pop();
            return resolved;
        }
        self.included_type(name).ok_or_else(|| IdlError::UnknownType {
            path: self.path.to_path_buf(),
            name: name.to_owned(),
        })
    }

    fn included_type(&self, name: &str) -> Option<TypeSpec> {
        let (prefix, rest) = name.split_once('.')?;
        let module = self.includes.get(prefix)?;
        if module.types.struct_spec(rest).is_some() {
            return Some(TypeSpec::Struct(name.to_owned()));
        }
        if module.types.enum_spec(rest).is_some() {
            return Some(TypeSpec::Enum(name.to_owned()));
        }
        module.typedefs.get(rest).map(|ty| ty.qualified(prefix))
    }

    fn literal_in(
        &self,
        literal: &Literal,
        visiting: &mut Vec<&'a str>,
    ) -> Result<ConstValue, IdlError> {
        Ok(match literal {
            Literal::Int(value) => ConstValue::Int(*value),
            Literal::Double(value) => ConstValue::Double(*value),
            Literal::Str(value) => ConstValue::String(value.clone()),
            Literal::List(items) => ConstValue::List(
                items
                    .iter()
                    .map(|item| self.literal_in(item, visiting))
                    .collect::<Result<_, _>>()?,
            ),
            Literal::Map(entries) => ConstValue::Map(
                entries
                    .iter()
                    .map(|(key, value)| {
                        Ok((self.literal_in(key, visiting)?, self.literal_in(value, visiting)?))
                    })
                    .collect::<Result<_, IdlError>>()?,
            ),
            Literal::Ident(name) => return self.constant_reference(name, visiting),
        })
    }

    fn constant_reference(
        &self,
        name: &str,
        visiting: &mut Vec<&'a str>,
    ) -> Result<ConstValue, IdlError> {
        match name {
            "true" => return Ok(ConstValue::Int(1)),
            "false" => return Ok(ConstValue::Int(0)),
            _ => {}
        }
        let unknown = || IdlError::UnknownConstant {
            path: self.path.to_path_buf(),
            name: name.to_owned(),
        };
        if let Some((key, literal)) = self.consts.get_key_value(name) {
            if visiting.contains(key) {
                return Err(unknown());
            }
            visiting.push(*key);
            let resolved = self.literal_in(literal, visiting);
            visiting.pop();
            return resolved;
        }
        let (head, tail) = name.split_once('.').ok_or_else(unknown)?;
        if let Some(spec) = self.enums.get(head) {
            return spec
                .value_of(tail)
                .map(|value| ConstValue::Int(i64::from(value)))
                .ok_or_else(unknown);
        }
        let module = self.includes.get(head).ok_or_else(unknown)?;
        if let Some(value) = module.constants.get(tail) {
            return Ok(value.clone());
        }
        let (enumeration, member) = tail.split_once('.').ok_or_else(unknown)?;
        module
            .types
            .enum_spec(enumeration)
            .and_then(|spec| spec.value_of(member))
            .map(|value| ConstValue::Int(i64::from(value)))
            .ok_or_else(unknown)
    }

    fn duplicate(&self, name: &str) -> IdlError {
        IdlError::DuplicateDefinition {
            path: self.path.to_path_buf(),
            name: name.to_owned(),
        }
    }
}

/// File stem used both as a module name and as an include prefix.
pub(super) fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Stable identity of a file for cycle detection and caching.
pub(super) fn file_identity(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
