//! Moves [`StructValue`]s through Thrift protocols using a schema.

use indexmap::{IndexMap, IndexSet};
use thrift::protocol::{
    TFieldIdentifier, TInputProtocol, TListIdentifier, TMapIdentifier, TOutputProtocol,
    TSetIdentifier, TStructIdentifier, TType,
};
use thriftgate_idl::{StructSpec, TypeSpec, TypeTable, WireType};

use crate::error::CodecError;
use crate::value::{StructValue, TypedValue};

/// Protocol type tag for a wire type.
#[must_use]
pub const fn ttype(wire: WireType) -> TType {
    match wire {
        WireType::Bool => TType::Bool,
        WireType::Byte => TType::I08,
        WireType::I16 => TType::I16,
        WireType::I32 => TType::I32,
        WireType::I64 => TType::I64,
        WireType::Double => TType::Double,
        WireType::String => TType::String,
        WireType::Struct => TType::Struct,
        WireType::Map => TType::Map,
        WireType::Set => TType::Set,
        WireType::List => TType::List,
    }
}

/// Writes the set fields of `value` as a struct of shape `spec`.
///
/// # Errors
///
/// Returns a [`CodecError`] when a field value does not match its declared
/// type or the protocol fails.
pub fn write_struct(
    output: &mut dyn TOutputProtocol,
    value: &StructValue,
    spec: &StructSpec,
    types: &TypeTable,
) -> Result<(), CodecError> {
    output.write_struct_begin(&TStructIdentifier::new(spec.name.as_str()))?;
    for field in spec.fields_by_id() {
        let Some(item) = value.get(field.id) else {
            continue;
        };
        output.write_field_begin(&TFieldIdentifier::new(
            field.name.as_str(),
            ttype(field.wire_type()),
            field.id,
        ))?;
        write_value(output, item, &field.ty, types, &field.name)?;
        output.write_field_end()?;
    }
    output.write_field_stop()?;
    output.write_struct_end()?;
    Ok(())
}

/// Reads a struct of shape `spec`.
///
/// Fields with unknown ids, or whose wire type differs from the declared
/// one, are skipped.
///
/// # Errors
///
/// Returns a [`CodecError`] when the protocol fails or a collection element
/// carries an unexpected wire type.
pub fn read_struct(
    input: &mut dyn TInputProtocol,
    spec: &StructSpec,
    types: &TypeTable,
) -> Result<StructValue, CodecError> {
    let mut value = StructValue::zeroed(spec.name.as_str());
    input.read_struct_begin()?;
    loop {
        let header = input.read_field_begin()?;
        if header.field_type == TType::Stop {
            break;
        }
        let declared = header
            .id
            .and_then(|id| spec.field(id))
            .filter(|field| ttype(field.wire_type()) == header.field_type);
        match declared {
            Some(field) => {
                let item = read_value(input, &field.ty, types, &field.name)?;
                value.set(field.id, item);
            }
            None => input.skip(header.field_type)?,
        }
        input.read_field_end()?;
    }
    input.read_struct_end()?;
    Ok(value)
}

fn write_value(
    output: &mut dyn TOutputProtocol,
    value: &TypedValue,
    ty: &TypeSpec,
    types: &TypeTable,
    path: &str,
) -> Result<(), CodecError> {
    let mismatch = || CodecError::mismatch(path, ty, value.kind_name());
    match (ty, value) {
        (TypeSpec::Bool, TypedValue::Bool(flag)) => output.write_bool(*flag)?,
        (TypeSpec::Byte, TypedValue::Byte(number)) => output.write_i8(*number)?,
        (TypeSpec::I16, TypedValue::I16(number)) => output.write_i16(*number)?,
        (TypeSpec::I32, TypedValue::I32(number)) | (TypeSpec::Enum(_), TypedValue::Enum(number)) => {
            output.write_i32(*number)?;
        }
        (TypeSpec::I64, TypedValue::I64(number)) => output.write_i64(*number)?,
        (TypeSpec::Double, TypedValue::Double(number)) => output.write_double(*number)?,
        (TypeSpec::String, TypedValue::String(text)) => output.write_string(text)?,
        (TypeSpec::Binary, TypedValue::Binary(bytes)) => output.write_bytes(bytes)?,
        (TypeSpec::Binary, TypedValue::String(text)) => output.write_bytes(text.as_bytes())?,
        (TypeSpec::Struct(name), TypedValue::Struct(inner)) => {
            let spec = types
                .struct_spec(name)
                .ok_or_else(|| CodecError::unknown_type(path, name))?;
            write_struct(output, inner, spec, types)?;
        }
        (TypeSpec::List(element), TypedValue::List(items)) => {
            output.write_list_begin(&TListIdentifier::new(
                ttype(element.wire_type()),
                wire_len(items.len(), path)?,
            ))?;
            for item in items {
                write_value(output, item, element, types, path)?;
            }
            output.write_list_end()?;
        }
        (TypeSpec::Set(element), TypedValue::Set(items)) => {
            output.write_set_begin(&TSetIdentifier::new(
                ttype(element.wire_type()),
                wire_len(items.len(), path)?,
            ))?;
            for item in items {
                write_value(output, item, element, types, path)?;
            }
            output.write_set_end()?;
        }
        (TypeSpec::Map(key_ty, value_ty), TypedValue::Map(entries)) => {
            output.write_map_begin(&TMapIdentifier::new(
                ttype(key_ty.wire_type()),
                ttype(value_ty.wire_type()),
                wire_len(entries.len(), path)?,
            ))?;
            for (key, item) in entries {
                write_value(output, key, key_ty, types, path)?;
                write_value(output, item, value_ty, types, path)?;
            }
            output.write_map_end()?;
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

fn read_value(
    input: &mut dyn TInputProtocol,
    ty: &TypeSpec,
    types: &TypeTable,
    path: &str,
) -> Result<TypedValue, CodecError> {
    Ok(match ty {
        TypeSpec::Bool => TypedValue::Bool(input.read_bool()?),
        TypeSpec::Byte => TypedValue::Byte(input.read_i8()?),
        TypeSpec::I16 => TypedValue::I16(input.read_i16()?),
        TypeSpec::I32 => TypedValue::I32(input.read_i32()?),
        TypeSpec::Enum(_) => TypedValue::Enum(input.read_i32()?),
        TypeSpec::I64 => TypedValue::I64(input.read_i64()?),
        TypeSpec::Double => TypedValue::Double(input.read_double()?),
        TypeSpec::String => TypedValue::String(input.read_string()?),
        TypeSpec::Binary => TypedValue::Binary(input.read_bytes()?),
        TypeSpec::Struct(name) => {
            let spec = types
                .struct_spec(name)
                .ok_or_else(|| CodecError::unknown_type(path, name))?;
            TypedValue::Struct(read_struct(input, spec, types)?)
        }
        TypeSpec::List(element) => {
            let header = input.read_list_begin()?;
            expect_element(header.element_type, element, path)?;
            let mut items = Vec::new();
            for _ in 0..header.size {
                items.push(read_value(input, element, types, path)?);
            }
            input.read_list_end()?;
            TypedValue::List(items)
        }
        TypeSpec::Set(element) => {
            let header = input.read_set_begin()?;
            expect_element(header.element_type, element, path)?;
            let mut items = IndexSet::new();
            for _ in 0..header.size {
                items.insert(read_value(input, element, types, path)?);
            }
            input.read_set_end()?;
            TypedValue::Set(items)
        }
        TypeSpec::Map(key_ty, value_ty) => {
            let header = input.read_map_begin()?;
            if header.size > 0 {
                expect_element(header.key_type.unwrap_or(TType::Stop), key_ty, path)?;
                expect_element(header.value_type.unwrap_or(TType::Stop), value_ty, path)?;
            }
            let mut entries = IndexMap::new();
            for _ in 0..header.size {
                let key = read_value(input, key_ty, types, path)?;
                entries.insert(key, read_value(input, value_ty, types, path)?);
            }
            input.read_map_end()?;
            TypedValue::Map(entries)
        }
    })
}

fn expect_element(found: TType, declared: &TypeSpec, path: &str) -> Result<(), CodecError> {
    if found == ttype(declared.wire_type()) {
        return Ok(());
    }
    Err(CodecError::mismatch(path, declared, format!("{found:?} elements")))
}

fn wire_len(len: usize, path: &str) -> Result<i32, CodecError> {
    i32::try_from(len).map_err(|_| CodecError::TooLarge {
        path: path.to_owned(),
        count: len,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use rstest::{fixture, rstest};
    use serde_json::json;
    use thrift::protocol::{TBinaryInputProtocol, TBinaryOutputProtocol};
    use thriftgate_idl::{ModuleDescriptor, SchemaLoader};

    use super::*;
    use crate::decode::decode_struct;

    #[fixture]
    fn module() -> ModuleDescriptor {
        SchemaLoader::default()
            .load_source(
                Path::new("wire.thrift"),
                concat!(
                    "enum Kind { A = 1, B = 2 }\n",
                    "struct Item { 1: string name, 2: Kind kind }\n",
                    "struct Order {\n",
                    "  1: i64 id,\n",
                    "  2: list<Item> items,\n",
                    "  3: map<string, double> prices,\n",
                    "  4: set<i16> tags,\n",
                    "  5: binary note,\n",
                    "  6: bool urgent,\n",
                    "  7: byte priority,\n",
                    "}\n",
                    "struct OrderV1 { 1: i64 id, 6: string urgent }\n",
                ),
            )
            .expect("schema")
    }

    fn encode_bytes(value: &StructValue, spec: &StructSpec, types: &TypeTable) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut output = TBinaryOutputProtocol::new(&mut buffer, true);
            write_struct(&mut output, value, spec, types).expect("write");
        }
        buffer
    }

    #[rstest]
    fn structs_survive_the_binary_protocol(module: ModuleDescriptor) {
        let spec = module.types.struct_spec("Order").expect("order");
        let value = decode_struct(
            &json!({
                "id": 42,
                "items": [{"name": "widget", "kind": "B"}],
                "prices": {"widget": 9.5},
                "tags": [1, 2],
                "note": "fragile",
                "urgent": true,
                "priority": 3,
            }),
            spec,
            &module.types,
        )
        .expect("decode");

        let bytes = encode_bytes(&value, spec, &module.types);
        let mut input = TBinaryInputProtocol::new(Cursor::new(bytes), true);
        let read = read_struct(&mut input, spec, &module.types).expect("read");

        assert_eq!(read, value);
    }

    #[rstest]
    fn mistyped_and_unknown_fields_are_skipped(module: ModuleDescriptor) {
        let order = module.types.struct_spec("Order").expect("order");
        let legacy = module.types.struct_spec("OrderV1").expect("legacy");
        let mut value = StructValue::zeroed("Order");
        value.set(1, TypedValue::I64(7));
        value.set(6, TypedValue::Bool(true));
        value.set(7, TypedValue::Byte(1));

        let bytes = encode_bytes(&value, order, &module.types);
        let mut input = TBinaryInputProtocol::new(Cursor::new(bytes), true);
        let read = read_struct(&mut input, legacy, &module.types).expect("read");

        assert_eq!(read.get(1), Some(&TypedValue::I64(7)));
        assert!(!read.is_set(6));
        assert_eq!(read.len(), 1);
    }

    #[rstest]
    fn rejects_values_of_the_wrong_type(module: ModuleDescriptor) {
        let spec = module.types.struct_spec("Order").expect("order");
        let mut value = StructValue::zeroed("Order");
        value.set(1, TypedValue::String("not a number".to_owned()));
        let mut buffer = Vec::new();
        let mut output = TBinaryOutputProtocol::new(&mut buffer, true);
        let error = write_struct(&mut output, &value, spec, &module.types).expect_err("mismatch");
        assert!(matches!(error, CodecError::Mismatch { .. }), "{error}");
    }
}
