//! Untyped JSON to [`TypedValue`].

use std::borrow::Cow;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Number, Value};
use thriftgate_idl::{StructKind, StructSpec, TypeSpec, TypeTable};

use crate::error::CodecError;
use crate::narrow;
use crate::value::{StructValue, TypedValue};

/// Decodes `value` against `ty`.
///
/// # Errors
///
/// Returns a [`CodecError`] naming the offending location when the value
/// does not fit the type.
pub fn decode(value: &Value, ty: &TypeSpec, types: &TypeTable) -> Result<TypedValue, CodecError> {
    decode_at(value, ty, types, "value")
}

/// Decodes a JSON object into a struct of shape `spec`.
///
/// Declared defaults are applied first; keys absent from `value` or set to
/// `null` leave the field at its default, and unknown keys are ignored.
///
/// # Errors
///
/// As for [`decode`]; paths start at `args` or `result` for method structs.
pub fn decode_struct(
    value: &Value,
    spec: &StructSpec,
    types: &TypeTable,
) -> Result<StructValue, CodecError> {
    let root = match spec.kind {
        StructKind::Arguments => "args",
        StructKind::Result => "result",
        StructKind::Struct | StructKind::Union | StructKind::Exception => spec.name.as_str(),
    };
    Decoder { types }.structure(value, spec, root)
}

pub(crate) fn decode_at(
    value: &Value,
    ty: &TypeSpec,
    types: &TypeTable,
    path: &str,
) -> Result<TypedValue, CodecError> {
    Decoder { types }.value(value, ty, path)
}

struct Decoder<'a> {
    types: &'a TypeTable,
}

impl Decoder<'_> {
    fn value(&self, value: &Value, ty: &TypeSpec, path: &str) -> Result<TypedValue, CodecError> {
        Ok(match ty {
            TypeSpec::Bool => TypedValue::Bool(boolean(value, path)?),
            TypeSpec::Byte => TypedValue::Byte(narrow::to_i8(integer(value, ty, path)?)),
            TypeSpec::I16 => TypedValue::I16(narrow::to_i16(integer(value, ty, path)?)),
            TypeSpec::I32 => TypedValue::I32(narrow::to_i32(integer(value, ty, path)?)),
            TypeSpec::I64 => TypedValue::I64(integer(value, ty, path)?),
            TypeSpec::Double => TypedValue::Double(double(value, path)?),
            TypeSpec::String => TypedValue::String(string(value, ty, path)?.to_owned()),
            TypeSpec::Binary => TypedValue::Binary(string(value, ty, path)?.as_bytes().to_vec()),
            TypeSpec::Enum(name) => TypedValue::Enum(self.enumeration(value, ty, name, path)?),
            TypeSpec::Struct(name) => {
                let spec = self
                    .types
                    .struct_spec(name)
                    .ok_or_else(|| CodecError::unknown_type(path, name))?;
                TypedValue::Struct(self.structure(value, spec, path)?)
            }
            TypeSpec::List(element) => TypedValue::List(
                array(value, ty, path)?
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.value(item, element, &format!("{path}[{index}]")))
                    .collect::<Result<_, _>>()?,
            ),
            TypeSpec::Set(element) => {
                let mut items = IndexSet::new();
                for (index, item) in array(value, ty, path)?.iter().enumerate() {
                    items.insert(self.value(item, element, &format!("{path}[{index}]"))?);
                }
                TypedValue::Set(items)
            }
            TypeSpec::Map(key, entry) => TypedValue::Map(self.map(value, ty, key, entry, path)?),
        })
    }

    fn structure(
        &self,
        value: &Value,
        spec: &StructSpec,
        path: &str,
    ) -> Result<StructValue, CodecError> {
        let object = match value {
            Value::Object(object) => Cow::Borrowed(object),
            Value::Array(pairs) => Cow::Owned(
                pairs_as_object(pairs)
                    .ok_or_else(|| CodecError::mismatch(path, &spec.name, describe(value)))?,
            ),
            _ => return Err(CodecError::mismatch(path, &spec.name, describe(value))),
        };
        let mut result = StructValue::with_defaults(spec, self.types)?;
        for field in &spec.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) => {}
                Some(item) => {
                    let child = format!("{path}.{}", field.name);
                    result.set(field.id, self.value(item, &field.ty, &child)?);
                }
            }
        }
        Ok(result)
    }

    fn map(
        &self,
        value: &Value,
        ty: &TypeSpec,
        key_ty: &TypeSpec,
        value_ty: &TypeSpec,
        path: &str,
    ) -> Result<IndexMap<TypedValue, TypedValue>, CodecError> {
        let mut entries = IndexMap::new();
        match value {
            Value::Object(object) => {
                for (key, item) in object {
                    let child = format!("{path}.{key}");
                    let decoded_key = self.value(&key_as_value(key, key_ty), key_ty, &child)?;
                    entries.insert(decoded_key, self.value(item, value_ty, &child)?);
                }
            }
            Value::Array(pairs) => {
                for (index, pair) in pairs.iter().enumerate() {
                    let child = format!("{path}[{index}]");
                    let (Some(key), Some(item)) = (pair.get("key"), pair.get("value")) else {
                        return Err(CodecError::mismatch(
                            &child,
                            "{\"key\", \"value\"} object",
                            describe(pair),
                        ));
                    };
                    let decoded_key = self.value(key, key_ty, &format!("{child}.key"))?;
                    let decoded = self.value(item, value_ty, &format!("{child}.value"))?;
                    entries.insert(decoded_key, decoded);
                }
            }
            _ => return Err(CodecError::mismatch(path, ty, describe(value))),
        }
        Ok(entries)
    }

    fn enumeration(
        &self,
        value: &Value,
        ty: &TypeSpec,
        name: &str,
        path: &str,
    ) -> Result<i32, CodecError> {
        let spec = self
            .types
            .enum_spec(name)
            .ok_or_else(|| CodecError::unknown_type(path, name))?;
        if let Value::String(member) = value {
            if let Some(found) = spec.value_of(member) {
                return Ok(found);
            }
            if parse_integer(member).is_none() {
                return Err(CodecError::UnknownEnumMember {
                    path: path.to_owned(),
                    name: name.to_owned(),
                    member: member.clone(),
                });
            }
        }
        integer(value, ty, path).map(narrow::to_i32)
    }
}

fn integer(value: &Value, ty: &TypeSpec, path: &str) -> Result<i64, CodecError> {
    match value {
        Value::Number(number) => Ok(number_to_i64(number)),
        Value::Bool(flag) => Ok(i64::from(*flag)),
        Value::String(text) => {
            parse_integer(text).ok_or_else(|| CodecError::mismatch(path, ty, describe(value)))
        }
        _ => Err(CodecError::mismatch(path, ty, describe(value))),
    }
}

fn double(value: &Value, path: &str) -> Result<f64, CodecError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| CodecError::mismatch(path, TypeSpec::Double, describe(value)))
}

fn boolean(value: &Value, path: &str) -> Result<bool, CodecError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => {
            Ok(number_to_i64(number) != 0 || number.as_f64().is_some_and(f64::is_normal))
        }
        _ => Err(CodecError::mismatch(path, TypeSpec::Bool, describe(value))),
    }
}

fn string<'v>(value: &'v Value, ty: &TypeSpec, path: &str) -> Result<&'v str, CodecError> {
    value
        .as_str()
        .ok_or_else(|| CodecError::mismatch(path, ty, describe(value)))
}

fn array<'v>(value: &'v Value, ty: &TypeSpec, path: &str) -> Result<&'v [Value], CodecError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| CodecError::mismatch(path, ty, describe(value)))
}

/// Integral part of any JSON number, truncated toward zero.
fn number_to_i64(number: &Number) -> i64 {
    number
        .as_i64()
        .or_else(|| number.as_u64().map(narrow::u64_to_i64))
        .or_else(|| number.as_f64().map(narrow::f64_to_i64))
        .unwrap_or_default()
}

fn parse_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().map(narrow::f64_to_i64))
}

/// Object keys are always strings; recover the JSON value they spell for
/// non-string key types.
fn key_as_value(key: &str, key_ty: &TypeSpec) -> Value {
    match key_ty {
        TypeSpec::String | TypeSpec::Binary | TypeSpec::Enum(_) => Value::String(key.to_owned()),
        _ => serde_json::from_str(key).unwrap_or_else(|_| Value::String(key.to_owned())),
    }
}

fn pairs_as_object(pairs: &[Value]) -> Option<serde_json::Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| {
            let key = pair.get("key")?.as_str()?.to_owned();
            Some((key, pair.get("value")?.clone()))
        })
        .collect()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(flag) => format!("bool {flag}"),
        Value::Number(number) => format!("number {number}"),
        Value::String(text) => format!("string \"{text}\""),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(_) => "object".to_owned(),
    }
}
