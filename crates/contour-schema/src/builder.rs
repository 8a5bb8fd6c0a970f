//! # Schema Builder
//!
//! Maps one type to one [`Schema`] node. Object types are built from their
//! flattened field list; every nested type goes back through the
//! [`Registry`] so shared and recursive types compose the same way in both
//! schema modes.
//!
//! | Rust type | Schema |
//! |---|---|
//! | `bool` | `boolean` |
//! | `i8`..`i32`, `u8`..`u32` | `integer`, `format: int32` |
//! | `i64`, `u64`, `isize`, `usize` | `integer`, `format: int64` |
//! | `f32` / `f64` | `number`, `format: float` / `double` |
//! | `String` | `string` |
//! | `DateTime<Utc>` / `NaiveDate` / `Uuid` | `string` with `date-time` / `date` / `uuid` |
//! | `serde_json::Value` | `{}` |
//! | `Option<T>` | schema of `T`, nullable |
//! | `Vec<T>` | `array` with `items` |
//! | `HashMap<String, V>` | `object` with `additionalProperties` |
//!
//! Unsigned integers also get `minimum: 0`.

use serde_json::Number;

use crate::annotation::Annotation;
use crate::error::SetupError;
use crate::introspect::{FieldDescriptor, StructInfo};
use crate::reflect::{Shape, TypeDef, TypeRef};
use crate::registry::{BuildCtx, Registry};
use crate::schema::{AdditionalProperties, Schema, SchemaType};

/// Build a non-object type. Nested types are resolved through `registry`.
pub(crate) fn build_value(
    registry: &Registry,
    ctx: &mut BuildCtx,
    ty: TypeRef,
    def: TypeDef,
) -> Result<Schema, SetupError> {
    let mut schema = match def.shape {
        Shape::Bool => Schema::of_type(SchemaType::Boolean),
        Shape::Integer { bits, signed } => {
            let format = if bits <= 32 { "int32" } else { "int64" };
            let mut s = Schema::with_format(SchemaType::Integer, format);
            if !signed {
                s.minimum = Some(Number::from(0));
            }
            s
        }
        Shape::Number { bits } => {
            let format = if bits <= 32 { "float" } else { "double" };
            Schema::with_format(SchemaType::Number, format)
        }
        Shape::String => Schema::of_type(SchemaType::String),
        Shape::DateTime => Schema::with_format(SchemaType::String, "date-time"),
        Shape::Date => Schema::with_format(SchemaType::String, "date"),
        Shape::Uuid => Schema::with_format(SchemaType::String, "uuid"),
        Shape::Any => Schema::default(),
        Shape::Optional(inner) => {
            let mut s = registry.use_site(ctx, inner)?;
            s.make_nullable();
            s
        }
        Shape::Array(item) => Schema {
            items: Some(Box::new(registry.use_site(ctx, item)?)),
            ..Schema::of_type(SchemaType::Array)
        },
        Shape::Map(value) => Schema {
            additional_properties: Some(AdditionalProperties::Schema(Box::new(
                registry.use_site(ctx, value)?,
            ))),
            ..Schema::of_type(SchemaType::Object)
        },
        Shape::Alias(inner) => return registry.use_site(ctx, inner),
        Shape::Object(_) => return registry.use_site(ctx, ty),
    };
    if schema.description.is_none() {
        schema.description = def.doc.map(str::to_string);
    }
    Ok(schema)
}

/// Build the full schema of an object type from its field list.
pub(crate) fn build_object(
    registry: &Registry,
    ctx: &mut BuildCtx,
    info: &StructInfo,
) -> Result<Schema, SetupError> {
    let mut schema = Schema::of_type(SchemaType::Object);
    schema.description = info.doc.map(str::to_string);
    for field in &info.fields {
        let property = build_field(registry, ctx, field)?;
        if field.required {
            schema.required.push(field.json_name.clone());
        }
        schema.properties.push(field.json_name.clone(), property);
    }
    if info.deny_unknown_fields {
        schema.additional_properties = Some(AdditionalProperties::Allowed(false));
    }
    Ok(schema)
}

/// Schema for one field: the type's use-site schema with the field's
/// annotations layered on top.
pub fn field_schema(registry: &Registry, field: &FieldDescriptor) -> Result<Schema, SetupError> {
    let mut schema = registry.schema_for(field.ty)?;
    apply_annotations(&mut schema, field);
    Ok(schema)
}

fn build_field(registry: &Registry, ctx: &mut BuildCtx, field: &FieldDescriptor) -> Result<Schema, SetupError> {
    let mut schema = registry.use_site(ctx, field.ty)?;
    apply_annotations(&mut schema, field);
    Ok(schema)
}

fn apply_annotations(schema: &mut Schema, field: &FieldDescriptor) {
    for annotation in &field.annotations {
        match annotation {
            Annotation::Doc(doc) => schema.description = Some(doc.clone()),
            Annotation::Format(format) => schema.format = Some(format.clone()),
            Annotation::Enum(values) => match schema.items.as_deref_mut() {
                Some(items) => items.enum_values = Some(values.clone()),
                None => schema.enum_values = Some(values.clone()),
            },
            Annotation::Default(value) => schema.default = Some(value.clone()),
            Annotation::Example(value) => schema.examples.push(value.clone()),
            Annotation::Examples(values) => schema.examples.extend(values.iter().cloned()),
            Annotation::Minimum(n) => schema.minimum = Some(n.clone()),
            Annotation::ExclusiveMinimum(n) => schema.exclusive_minimum = Some(n.clone()),
            Annotation::Maximum(n) => schema.maximum = Some(n.clone()),
            Annotation::ExclusiveMaximum(n) => schema.exclusive_maximum = Some(n.clone()),
            Annotation::MultipleOf(n) => schema.multiple_of = Some(n.clone()),
            Annotation::MinLength(n) => schema.min_length = Some(*n),
            Annotation::MaxLength(n) => schema.max_length = Some(*n),
            Annotation::Pattern(p) => schema.pattern = Some(p.clone()),
            Annotation::MinItems(n) => schema.min_items = Some(*n),
            Annotation::MaxItems(n) => schema.max_items = Some(*n),
            Annotation::UniqueItems(flag) => schema.unique_items = *flag,
            Annotation::MinProperties(n) => schema.min_properties = Some(*n),
            Annotation::MaxProperties(n) => schema.max_properties = Some(*n),
            Annotation::Nullable(true) => schema.make_nullable(),
            Annotation::ReadOnly(flag) => schema.read_only = *flag,
            Annotation::WriteOnly(flag) => schema.write_only = *flag,
            Annotation::Deprecated(flag) => schema.deprecated = *flag,
            Annotation::Rename(_)
            | Annotation::OmitEmpty(_)
            | Annotation::Required(_)
            | Annotation::Hidden(_)
            | Annotation::Nullable(false)
            | Annotation::Location(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::Reflect;
    use crate::registry::SchemaMode;
    use serde_json::json;

    struct Greeting;
    impl Reflect for Greeting {
        fn reflect() -> TypeDef {
            TypeDef::object()
                .doc("A greeting message.")
                .field::<String>(
                    "message",
                    &[("maxLength", "30"), ("example", "Hello, world!"), ("doc", "Greeting text")],
                )
                .field::<Vec<String>>("tags", &[("enum", "a,b"), ("uniqueItems", "true"), ("omitempty", "")])
                .field::<Option<i64>>("count", &[])
                .field::<u8>("level", &[("default", "3")])
                .field::<chrono::DateTime<chrono::Utc>>("at", &[("readOnly", "")])
                .deny_unknown_fields()
        }
    }

    #[test]
    fn object_schema_matches_fields() {
        let reg = Registry::new(SchemaMode::Inline);
        let s = serde_json::to_value(reg.schema_of::<Greeting>().unwrap()).unwrap();
        assert_eq!(
            s,
            json!({
                "type": "object",
                "description": "A greeting message.",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "Greeting text",
                        "examples": ["Hello, world!"],
                        "maxLength": 30
                    },
                    "tags": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["a", "b"]},
                        "uniqueItems": true
                    },
                    "count": {"type": ["integer", "null"], "format": "int64"},
                    "level": {"type": "integer", "format": "int32", "default": 3, "minimum": 0},
                    "at": {"type": "string", "format": "date-time", "readOnly": true}
                },
                "required": ["message", "at"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn maps_use_additional_properties() {
        let reg = Registry::default();
        let s = reg
            .schema_of::<std::collections::HashMap<String, f32>>()
            .unwrap();
        assert_eq!(
            serde_json::to_value(s).unwrap(),
            json!({"type": "object", "additionalProperties": {"type": "number", "format": "float"}})
        );
    }

    #[test]
    fn any_value_is_unconstrained() {
        let reg = Registry::default();
        let s = reg.schema_of::<serde_json::Value>().unwrap();
        assert_eq!(serde_json::to_value(s).unwrap(), json!({}));
    }
}
