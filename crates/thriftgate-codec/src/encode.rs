//! [`TypedValue`] to untyped JSON.

use serde_json::{Map, Value};
use thriftgate_idl::{StructSpec, TypeSpec, TypeTable};

use crate::error::CodecError;
use crate::value::{StructValue, TypedValue};

/// Encodes `value` as `ty`, substituting the type's empty value when absent.
///
/// Absent numbers encode as `0`, strings and binaries as `""`, booleans as
/// `false`, structs as `null`, and collections as `[]`. Maps always encode as
/// an array of `{"key", "value"}` objects so non-string keys survive.
///
/// # Errors
///
/// Returns a [`CodecError`] when `value` does not match `ty`.
pub fn encode(
    value: Option<&TypedValue>,
    ty: &TypeSpec,
    types: &TypeTable,
) -> Result<Value, CodecError> {
    Encoder { types }.value(value, ty, "value")
}

/// Encodes every field declared by `spec`, in ascending field-id order.
///
/// # Errors
///
/// As for [`encode`].
pub fn encode_struct(
    value: &StructValue,
    spec: &StructSpec,
    types: &TypeTable,
) -> Result<Value, CodecError> {
    Encoder { types }.structure(value, spec, &spec.name)
}

struct Encoder<'a> {
    types: &'a TypeTable,
}

impl Encoder<'_> {
    fn value(
        &self,
        value: Option<&TypedValue>,
        ty: &TypeSpec,
        path: &str,
    ) -> Result<Value, CodecError> {
        let Some(present) = value else {
            return Ok(empty(ty));
        };
        let mismatch = || CodecError::mismatch(path, ty, present.kind_name());
        Ok(match (ty, present) {
            (TypeSpec::Bool, TypedValue::Bool(flag)) => Value::Bool(*flag),
            (TypeSpec::Byte | TypeSpec::I16 | TypeSpec::I32 | TypeSpec::I64 | TypeSpec::Enum(_), _) => {
                Value::from(present.as_integer().ok_or_else(mismatch)?)
            }
            (TypeSpec::Double, TypedValue::Double(number)) => Value::from(*number),
            (TypeSpec::String | TypeSpec::Binary, TypedValue::String(text)) => {
                Value::String(text.clone())
            }
            (TypeSpec::String | TypeSpec::Binary, TypedValue::Binary(bytes)) => {
                Value::String(String::from_utf8_lossy(bytes).into_owned())
            }
            (TypeSpec::Struct(name), TypedValue::Struct(inner)) => {
                let spec = self
                    .types
                    .struct_spec(name)
                    .ok_or_else(|| CodecError::unknown_type(path, name))?;
                self.structure(inner, spec, path)?
            }
            (TypeSpec::List(element), TypedValue::List(items)) => {
                self.sequence(items.iter(), element, path)?
            }
            (TypeSpec::Set(element), TypedValue::Set(items)) => {
                self.sequence(items.iter(), element, path)?
            }
            (TypeSpec::Map(key_ty, value_ty), TypedValue::Map(entries)) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (index, (key, item)) in entries.iter().enumerate() {
                    let child = format!("{path}[{index}]");
                    let mut pair = Map::new();
                    pair.insert(
                        "key".to_owned(),
                        self.value(Some(key), key_ty, &format!("{child}.key"))?,
                    );
                    pair.insert(
                        "value".to_owned(),
                        self.value(Some(item), value_ty, &format!("{child}.value"))?,
                    );
                    pairs.push(Value::Object(pair));
                }
                Value::Array(pairs)
            }
            _ => return Err(mismatch()),
        })
    }

    fn structure(
        &self,
        value: &StructValue,
        spec: &StructSpec,
        path: &str,
    ) -> Result<Value, CodecError> {
        let mut object = Map::new();
        for field in spec.fields_by_id() {
            let child = format!("{path}.{}", field.name);
            object.insert(
                field.name.clone(),
                self.value(value.get(field.id), &field.ty, &child)?,
            );
        }
        Ok(Value::Object(object))
    }

    fn sequence<'v>(
        &self,
        items: impl Iterator<Item = &'v TypedValue>,
        element: &TypeSpec,
        path: &str,
    ) -> Result<Value, CodecError> {
        items
            .enumerate()
            .map(|(index, item)| self.value(Some(item), element, &format!("{path}[{index}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

fn empty(ty: &TypeSpec) -> Value {
    match ty {
        TypeSpec::Bool => Value::Bool(false),
        TypeSpec::Byte | TypeSpec::I16 | TypeSpec::I32 | TypeSpec::I64 | TypeSpec::Enum(_) => {
            Value::from(0)
        }
        TypeSpec::Double => Value::from(0.0),
        TypeSpec::String | TypeSpec::Binary => Value::String(String::new()),
        TypeSpec::Struct(_) => Value::Null,
        TypeSpec::List(_) | TypeSpec::Set(_) | TypeSpec::Map(..) => Value::Array(Vec::new()),
    }
}
