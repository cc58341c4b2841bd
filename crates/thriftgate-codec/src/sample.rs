//! Deterministic sample payloads.

use indexmap::{IndexMap, IndexSet};
use thriftgate_idl::{StructSpec, TypeSpec, TypeTable};

use crate::error::CodecError;
use crate::narrow;
use crate::value::{StructValue, TypedValue};

const INTEGER_BASE: i64 = 123;
const DOUBLE_BASE: i32 = 456;

/// Fills every field of `spec` with synthetic data.
///
/// One counter `n` is shared by the whole generation and advances at every
/// numeric, string, or enum leaf: integers become `123 + n`, doubles
/// `(n + 456) / 10`, strings `"str{n}"`, and enums the member at `n` modulo
/// the member count. Booleans are `false`. Collections get one element.
/// Fields with declared defaults keep them. A struct already being generated
/// further up the same path is left unset, so recursive types terminate.
///
/// # Errors
///
/// Returns a [`CodecError`] when a referenced type is missing from `types`
/// or a declared default does not fit its field.
pub fn generate_sample(spec: &StructSpec, types: &TypeTable) -> Result<StructValue, CodecError> {
    let mut generator = SampleGenerator {
        types,
        counter: 0,
        stack: Vec::new(),
    };
    generator.structure(spec, &spec.name)
}

struct SampleGenerator<'a> {
    types: &'a TypeTable,
    counter: i32,
    stack: Vec<&'a str>,
}

impl<'a> SampleGenerator<'a> {
    fn next(&mut self) -> i32 {
        let current = self.counter;
        self.counter = self.counter.wrapping_add(1);
        current
    }

    fn structure(&mut self, spec: &'a StructSpec, path: &str) -> Result<StructValue, CodecError> {
        let mut value = StructValue::with_defaults(spec, self.types)?;
        self.stack.push(spec.name.as_str());
        for field in &spec.fields {
            let existing = value.take(field.id);
            let child = format!("{path}.{}", field.name);
            if let Some(generated) = self.value(existing, &field.ty, &child)? {
                value.set(field.id, generated);
            }
        }
        self.stack.pop();
        Ok(value)
    }

    /// `None` only for a struct that would recurse into itself.
    fn value(
        &mut self,
        existing: Option<TypedValue>,
        ty: &'a TypeSpec,
        path: &str,
    ) -> Result<Option<TypedValue>, CodecError> {
        let generated = match (ty, existing) {
            (TypeSpec::Struct(name), existing) => return self.nested(name, existing, path),
            (TypeSpec::List(element), existing) => {
                let mut items = match existing {
                    Some(TypedValue::List(items)) => items,
                    _ => Vec::new(),
                };
                items.extend(self.value(None, element, &format!("{path}[]"))?);
                TypedValue::List(items)
            }
            (TypeSpec::Set(element), existing) => {
                let mut items = match existing {
                    Some(TypedValue::Set(items)) => items,
                    _ => IndexSet::new(),
                };
                items.extend(self.value(None, element, &format!("{path}[]"))?);
                TypedValue::Set(items)
            }
            (TypeSpec::Map(key_ty, value_ty), existing) => {
                let mut entries = match existing {
                    Some(TypedValue::Map(entries)) => entries,
                    _ => IndexMap::new(),
                };
                let key = self.value(None, key_ty, &format!("{path}.key"))?;
                let item = self.value(None, value_ty, &format!("{path}.value"))?;
                if let (Some(generated_key), Some(generated_item)) = (key, item) {
                    entries.insert(generated_key, generated_item);
                }
                TypedValue::Map(entries)
            }
            (_, Some(kept)) => kept,
            (leaf, None) => self.leaf(leaf, path)?,
        };
        Ok(Some(generated))
    }

    fn nested(
        &mut self,
        name: &'a str,
        existing: Option<TypedValue>,
        path: &str,
    ) -> Result<Option<TypedValue>, CodecError> {
        if self.stack.contains(&name) {
            return Ok(existing);
        }
        let spec = self
            .types
            .struct_spec(name)
            .ok_or_else(|| CodecError::unknown_type(path, name))?;
        let mut generated = self.structure(spec, path)?;
        if let Some(TypedValue::Struct(kept)) = existing {
            for (id, field) in kept.iter() {
                generated.set(id, field.clone());
            }
        }
        Ok(Some(TypedValue::Struct(generated)))
    }

    fn leaf(&mut self, ty: &TypeSpec, path: &str) -> Result<TypedValue, CodecError> {
        Ok(match ty {
            TypeSpec::Bool => TypedValue::Bool(false),
            TypeSpec::Byte => TypedValue::Byte(narrow::to_i8(self.next_integer())),
            TypeSpec::I16 => TypedValue::I16(narrow::to_i16(self.next_integer())),
            TypeSpec::I32 => TypedValue::I32(narrow::to_i32(self.next_integer())),
            TypeSpec::I64 => TypedValue::I64(self.next_integer()),
            TypeSpec::Double => TypedValue::Double(tenth(self.next().wrapping_add(DOUBLE_BASE))),
            TypeSpec::String => TypedValue::String(format!("str{}", self.next())),
            TypeSpec::Binary => TypedValue::Binary(format!("str{}", self.next()).into_bytes()),
            TypeSpec::Enum(name) => {
                let spec = self
                    .types
                    .enum_spec(name)
                    .ok_or_else(|| CodecError::unknown_type(path, name))?;
                let index = usize::try_from(self.next()).unwrap_or_default();
                let member = index
                    .checked_rem(spec.members.len())
                    .and_then(|position| spec.members.get_index(position))
                    .map_or(0, |(_, value)| *value);
                TypedValue::Enum(member)
            }
            TypeSpec::Struct(_) | TypeSpec::List(_) | TypeSpec::Set(_) | TypeSpec::Map(..) => {
                return Err(CodecError::mismatch(path, ty, "a scalar leaf"));
            }
        })
    }

    fn next_integer(&mut self) -> i64 {
        INTEGER_BASE.wrapping_add(i64::from(self.next()))
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "sample doubles are defined as a tenth of the counter offset"
)]
fn tenth(value: i32) -> f64 {
    f64::from(value) / 10.0
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rstest::{fixture, rstest};
    use thriftgate_idl::{ModuleDescriptor, SchemaLoader};

    use super::*;

    #[fixture]
    fn module() -> ModuleDescriptor {
        SchemaLoader::default()
            .load_source(
                Path::new("sample.thrift"),
                concat!(
                    "enum Mode { FAST = 5, SLOW = 9 }\n",
                    "struct Leaf { 1: string label, 2: double weight }\n",
                    "struct Tree {\n",
                    "  1: i32 id,\n",
                    "  2: Leaf leaf,\n",
                    "  3: list<Tree> children,\n",
                    "  4: Tree parent,\n",
                    "  5: map<string, i64> scores,\n",
                    "  6: bool active,\n",
                    "  7: Mode mode,\n",
                    "  8: byte tiny = 3,\n",
                    "}\n",
                ),
            )
            .expect("schema")
    }

    fn tree(module: &ModuleDescriptor) -> &StructSpec {
        module.types.struct_spec("Tree").expect("tree")
    }

    #[rstest]
    fn fills_fields_in_declaration_order(module: ModuleDescriptor) {
        let sample = generate_sample(tree(&module), &module.types).expect("sample");

        assert_eq!(sample.get(1), Some(&TypedValue::I32(123)));
        let Some(TypedValue::Struct(leaf)) = sample.get(2) else {
            panic!("expected leaf struct");
        };
        assert_eq!(leaf.get(1), Some(&TypedValue::String("str1".to_owned())));
        assert_eq!(leaf.get(2), Some(&TypedValue::Double(45.8)));

        let Some(TypedValue::Map(scores)) = sample.get(5) else {
            panic!("expected map");
        };
        assert_eq!(
            scores.get(&TypedValue::String("str3".to_owned())),
            Some(&TypedValue::I64(127))
        );
        assert_eq!(sample.get(6), Some(&TypedValue::Bool(false)));
        assert_eq!(sample.get(7), Some(&TypedValue::Enum(9)));
        assert_eq!(sample.get(8), Some(&TypedValue::Byte(3)));
    }

    #[rstest]
    fn recursive_fields_terminate(module: ModuleDescriptor) {
        let sample = generate_sample(tree(&module), &module.types).expect("sample");
        assert_eq!(sample.get(3), Some(&TypedValue::List(Vec::new())));
        assert!(!sample.is_set(4));
    }

    #[rstest]
    fn generation_is_deterministic(module: ModuleDescriptor) {
        let first = generate_sample(tree(&module), &module.types).expect("first");
        let second = generate_sample(tree(&module), &module.types).expect("second");
        assert_eq!(first, second);
    }

    #[rstest]
    fn numeric_leaves_are_distinct() {
        let module = SchemaLoader::default()
            .load_source(
                Path::new("flat.thrift"),
                "struct Flat { 1: i32 a, 2: i64 b, 3: i16 c, 4: list<i32> d }",
            )
            .expect("schema");
        let spec = module.types.struct_spec("Flat").expect("flat");
        let sample = generate_sample(spec, &module.types).expect("sample");
        let values: Vec<_> = sample
            .iter()
            .filter_map(|(_, value)| match value {
                TypedValue::List(items) => items.first().and_then(TypedValue::as_integer),
                other => other.as_integer(),
            })
            .collect();
        assert_eq!(values, vec![123, 124, 125, 126]);
    }
}
