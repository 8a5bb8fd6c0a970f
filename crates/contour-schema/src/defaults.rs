//! Default substitution.
//!
//! After a value validates, properties that are missing but declare a
//! `default` are filled in. Defaults are inserted as declared; they are
//! not re-validated against the property's own constraints.

use serde_json::Value;

use crate::registry::Registry;
use crate::schema::{AdditionalProperties, Schema};

/// Fill missing defaults into `value`, recursing into nested objects and
/// arrays. Returns the number of values inserted.
pub fn apply(registry: &Registry, schema: &Schema, value: &mut Value) -> usize {
    if let Some(reference) = &schema.reference {
        return match registry.resolve(reference) {
            Some(target) => apply(registry, &target, value),
            None => 0,
        };
    }
    let mut inserted = 0;
    match value {
        Value::Object(map) => {
            for (name, prop) in schema.properties.iter() {
                match map.get_mut(name) {
                    Some(existing) => inserted += apply(registry, prop, existing),
                    None => {
                        if let Some(default) = &prop.default {
                            map.insert(name.to_string(), default.clone());
                            inserted += 1;
                        }
                    }
                }
            }
            if let Some(AdditionalProperties::Schema(extra)) = &schema.additional_properties {
                for (name, v) in map.iter_mut() {
                    if !schema.properties.contains(name) {
                        inserted += apply(registry, extra, v);
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = &schema.items {
                for item in items {
                    inserted += apply(registry, item_schema, item);
                }
            }
        }
        _ => {}
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaType;
    use serde_json::json;

    #[test]
    fn fills_missing_and_keeps_present() {
        let mut inner = Schema::of_type(SchemaType::Object);
        inner.properties.push(
            "level",
            Schema {
                default: Some(json!(3)),
                ..Schema::of_type(SchemaType::Integer)
            },
        );
        let mut s = Schema::of_type(SchemaType::Object);
        s.properties.push(
            "suffix",
            Schema {
                default: Some(json!("!")),
                ..Schema::of_type(SchemaType::String)
            },
        );
        s.properties.push(
            "list",
            Schema {
                items: Some(Box::new(inner)),
                ..Schema::of_type(SchemaType::Array)
            },
        );

        let mut v = json!({"list": [{}, {"level": 9}]});
        let n = apply(&Registry::default(), &s, &mut v);
        assert_eq!(n, 2);
        assert_eq!(v, json!({"suffix": "!", "list": [{"level": 3}, {"level": 9}]}));
    }
}
