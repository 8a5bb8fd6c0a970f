//! # Validator
//!
//! Walks a [`Schema`] and a decoded JSON value in lockstep and collects
//! every violation. Nothing short-circuits except a type mismatch, which
//! skips the remaining checks for that one node.
//!
//! Per node the order is fixed:
//!
//! 1. type (including the nullable union)
//! 2. `enum`
//! 3. numeric, string, array and object bounds
//! 4. `required`, then declared properties in schema order, then
//!    undeclared properties; array items in index order
//! 5. `format`
//!
//! Error locations are dot/bracket paths under a caller-supplied prefix,
//! e.g. `body.items[2].id`.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::format;
use crate::registry::Registry;
use crate::schema::{AdditionalProperties, Schema, SchemaType};

/// Which side of the wire the value is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateMode {
    /// Requests: `readOnly` properties are not required.
    WriteToServer,
    /// Responses: `writeOnly` properties are not required.
    ReadFromServer,
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>, location: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            message: message.into(),
            location: location.into(),
            value,
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.location)?;
        if let Some(value) = &self.value {
            write!(f, ": {value}")?;
        }
        Ok(())
    }
}

/// Ordered list of errors from one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidateResult {
    pub errors: Vec<ErrorDetail>,
}

impl ValidateResult {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Append one error.
    pub fn add(&mut self, path: &PathBuffer, message: impl Into<String>, value: Option<&Value>) {
        self.errors
            .push(ErrorDetail::new(message, path.as_str(), value.cloned()));
    }

    /// Locations of all errors, in order.
    pub fn locations(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.location.as_str()).collect()
    }

    pub fn into_errors(self) -> Vec<ErrorDetail> {
        self.errors
    }
}

/// Reusable location buffer: push a segment, recurse, pop.
#[derive(Debug, Clone, Default)]
pub struct PathBuffer {
    buf: String,
    marks: Vec<usize>,
}

impl PathBuffer {
    pub fn new(prefix: &str) -> Self {
        Self {
            buf: prefix.to_string(),
            marks: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Enter an object property.
    pub fn push_field(&mut self, name: &str) {
        self.marks.push(self.buf.len());
        if !self.buf.is_empty() {
            self.buf.push('.');
        }
        self.buf.push_str(name);
    }

    /// Enter an array element.
    pub fn push_index(&mut self, index: usize) {
        self.marks.push(self.buf.len());
        self.buf.push('[');
        self.buf.push_str(&index.to_string());
        self.buf.push(']');
    }

    /// Leave the most recently entered segment.
    pub fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.buf.truncate(mark);
        }
    }
}

/// Validate `value` against `schema`, reporting locations under `prefix`.
pub fn validate(registry: &Registry, schema: &Schema, value: &Value, mode: ValidateMode, prefix: &str) -> ValidateResult {
    let mut path = PathBuffer::new(prefix);
    let mut result = ValidateResult::default();
    Validator { registry, mode }.node(schema, value, &mut path, &mut result);
    result
}

/// Validate into an existing path and result, for callers that validate
/// several locations into one report.
pub fn validate_into(
    registry: &Registry,
    schema: &Schema,
    value: &Value,
    mode: ValidateMode,
    path: &mut PathBuffer,
    result: &mut ValidateResult,
) {
    Validator { registry, mode }.node(schema, value, path, result);
}

struct Validator<'a> {
    registry: &'a Registry,
    mode: ValidateMode,
}

impl Validator<'_> {
    fn node(&self, schema: &Schema, value: &Value, path: &mut PathBuffer, res: &mut ValidateResult) {
        if value.is_null() && schema.is_nullable() {
            return;
        }

        if let Some(reference) = &schema.reference {
            match self.registry.resolve(reference) {
                Some(target) => self.node(&target, value, path, res),
                None => res.add(path, format!("unresolved schema reference {reference}"), None),
            }
        }

        if !schema.ty.is_empty() && !schema.ty.iter().any(|t| type_matches(t, value)) {
            let expected = schema.ty.primary().unwrap_or(SchemaType::Null);
            res.add(path, format!("expected {expected}"), Some(value));
            return;
        }

        if let Some(allowed) = &schema.enum_values {
            if !allowed.iter().any(|a| json_eq(a, value)) {
                res.add(
                    path,
                    format!("expected value to be one of \"{}\"", join_literals(allowed)),
                    Some(value),
                );
            }
        }

        match value {
            Value::Number(n) => self.numeric(schema, n, value, path, res),
            Value::String(s) => self.string_bounds(schema, s, value, path, res),
            Value::Array(items) => self.array(schema, items, value, path, res),
            Value::Object(map) => self.object(schema, map, value, path, res),
            Value::Null | Value::Bool(_) => {}
        }

        if let (Some(fmt), Value::String(s)) = (&schema.format, value) {
            if let Err(message) = format::check(fmt, s) {
                res.add(path, message, Some(value));
            }
        }
    }

    fn numeric(&self, schema: &Schema, n: &Number, value: &Value, path: &PathBuffer, res: &mut ValidateResult) {
        let Some(f) = n.as_f64() else { return };
        fn bound(b: &Option<Number>) -> Option<(f64, &Number)> {
            b.as_ref().and_then(|b| b.as_f64().map(|f| (f, b)))
        }
        if let Some((min, raw)) = bound(&schema.minimum) {
            if f < min {
                res.add(path, format!("expected number >= {raw}"), Some(value));
            }
        }
        if let Some((min, raw)) = bound(&schema.exclusive_minimum) {
            if f <= min {
                res.add(path, format!("expected number > {raw}"), Some(value));
            }
        }
        if let Some((max, raw)) = bound(&schema.maximum) {
            if f > max {
                res.add(path, format!("expected number <= {raw}"), Some(value));
            }
        }
        if let Some((max, raw)) = bound(&schema.exclusive_maximum) {
            if f >= max {
                res.add(path, format!("expected number < {raw}"), Some(value));
            }
        }
        if let Some((step, raw)) = bound(&schema.multiple_of) {
            let q = f / step;
            if (q - q.round()).abs() > 1e-9 {
                res.add(path, format!("expected number to be a multiple of {raw}"), Some(value));
            }
        }
    }

    fn string_bounds(&self, schema: &Schema, s: &str, value: &Value, path: &PathBuffer, res: &mut ValidateResult) {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.min_length {
            if len < min {
                res.add(path, format!("expected length >= {min}"), Some(value));
            }
        }
        if let Some(max) = schema.max_length {
            if len > max {
                res.add(path, format!("expected length <= {max}"), Some(value));
            }
        }
        if let Some(pattern) = &schema.pattern {
            if !pattern.is_match(s) {
                res.add(
                    path,
                    format!("expected string to match pattern {}", pattern.as_str()),
                    Some(value),
                );
            }
        }
    }

    fn array(&self, schema: &Schema, items: &[Value], value: &Value, path: &mut PathBuffer, res: &mut ValidateResult) {
        let len = items.len() as u64;
        if let Some(min) = schema.min_items {
            if len < min {
                res.add(path, format!("expected array length >= {min}"), Some(value));
            }
        }
        if let Some(max) = schema.max_items {
            if len > max {
                res.add(path, format!("expected array length <= {max}"), Some(value));
            }
        }
        if schema.unique_items && has_duplicates(items) {
            res.add(path, "expected array items to be unique", Some(value));
        }
        if let Some(item_schema) = &schema.items {
            for (i, item) in items.iter().enumerate() {
                path.push_index(i);
                self.node(item_schema, item, path, res);
                path.pop();
            }
        }
    }

    fn object(
        &self,
        schema: &Schema,
        map: &Map<String, Value>,
        value: &Value,
        path: &mut PathBuffer,
        res: &mut ValidateResult,
    ) {
        let count = map.len() as u64;
        if let Some(min) = schema.min_properties {
            if count < min {
                res.add(path, format!("expected object with at least {min} properties"), Some(value));
            }
        }
        if let Some(max) = schema.max_properties {
            if count > max {
                res.add(path, format!("expected object with at most {max} properties"), Some(value));
            }
        }

        for name in &schema.required {
            if map.contains_key(name) {
                continue;
            }
            if let Some(prop) = schema.properties.get(name) {
                let skip = match self.mode {
                    ValidateMode::WriteToServer => prop.read_only,
                    ValidateMode::ReadFromServer => prop.write_only,
                };
                if skip {
                    continue;
                }
            }
            path.push_field(name);
            res.add(path, format!("expected required property {name} to be present"), None);
            path.pop();
        }

        for (name, prop) in schema.properties.iter() {
            if let Some(v) = map.get(name) {
                path.push_field(name);
                self.node(prop, v, path, res);
                path.pop();
            }
        }

        match &schema.additional_properties {
            Some(AdditionalProperties::Allowed(false)) => {
                for (name, v) in map {
                    if !schema.properties.contains(name) {
                        path.push_field(name);
                        res.add(path, "unexpected property", Some(v));
                        path.pop();
                    }
                }
            }
            Some(AdditionalProperties::Schema(extra)) => {
                for (name, v) in map {
                    if !schema.properties.contains(name) {
                        path.push_field(name);
                        self.node(extra, v, path, res);
                        path.pop();
                    }
                }
            }
            Some(AdditionalProperties::Allowed(true)) | None => {}
        }
    }
}

fn type_matches(ty: SchemaType, value: &Value) -> bool {
    match ty {
        SchemaType::Null => value.is_null(),
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::String => value.is_string(),
        SchemaType::Array => value.is_array(),
        SchemaType::Object => value.is_object(),
        SchemaType::Number => value.is_number(),
        SchemaType::Integer => match value {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
    }
}

/// Structural equality with numbers compared by value, so `1` equals `1.0`.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b)),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}

fn has_duplicates(items: &[Value]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().any(|item| {
        let mut key = String::new();
        canonical(item, &mut key);
        !seen.insert(key)
    })
}

/// Canonical text of a value: sorted object keys, and integral numbers
/// written without a fraction. Two values are [`json_eq`] exactly when
/// their canonical texts match.
fn canonical(value: &Value, out: &mut String) {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&i.to_string());
            } else if let Some(u) = n.as_u64() {
                out.push_str(&u.to_string());
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    out.push_str(&(f as i64).to_string());
                } else {
                    out.push_str(&format!("{f:?}"));
                }
            }
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                canonical(&map[key], out);
            }
            out.push('}');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn join_literals(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Pattern;
    use serde_json::json;

    fn check(schema: &Schema, value: Value) -> ValidateResult {
        validate(&Registry::default(), schema, &value, ValidateMode::WriteToServer, "body")
    }

    fn id_schema() -> Schema {
        let mut s = Schema::of_type(SchemaType::Object);
        s.properties.push("id", Schema::of_type(SchemaType::String));
        s.required.push("id".into());
        s
    }

    #[test]
    fn missing_required_property() {
        let res = check(&id_schema(), json!({}));
        assert_eq!(res.len(), 1);
        assert_eq!(res.errors[0].location, "body.id");
        assert_eq!(res.errors[0].message, "expected required property id to be present");
    }

    #[test]
    fn wrong_type_for_property() {
        let res = check(&id_schema(), json!({"id": 123}));
        assert_eq!(res.len(), 1);
        assert_eq!(res.errors[0].location, "body.id");
        assert_eq!(res.errors[0].message, "expected string");
        assert_eq!(res.errors[0].value, Some(json!(123)));
    }

    #[test]
    fn enum_membership() {
        let s = Schema {
            enum_values: Some(vec![json!("a"), json!("b"), json!("c")]),
            ..Schema::default()
        };
        let res = check(&s, json!("d"));
        assert_eq!(res.len(), 1);
        assert_eq!(res.errors[0].message, "expected value to be one of \"a, b, c\"");
        assert!(check(&s, json!("b")).is_empty());
    }

    #[test]
    fn unique_items() {
        let s = Schema {
            unique_items: true,
            items: Some(Box::new(Schema::of_type(SchemaType::Integer))),
            ..Schema::of_type(SchemaType::Array)
        };
        assert_eq!(check(&s, json!([1, 2, 2])).len(), 1);
        assert!(check(&s, json!([1, 2, 3])).is_empty());
        assert_eq!(check(&s, json!([1, 1.0])).len(), 1);
    }

    #[test]
    fn unique_items_compares_nested_values_structurally() {
        let s = Schema {
            unique_items: true,
            ..Schema::of_type(SchemaType::Array)
        };
        assert_eq!(check(&s, json!([{"a": 1, "b": [2.0]}, {"b": [2], "a": 1.0}])).len(), 1);
        assert!(check(&s, json!([{"a": 1}, {"a": "1"}, [1], "x", 1.5])).is_empty());
    }

    #[test]
    fn unique_items_scales_to_large_arrays() {
        let s = Schema {
            unique_items: true,
            items: Some(Box::new(Schema::of_type(SchemaType::Integer))),
            ..Schema::of_type(SchemaType::Array)
        };
        let items: Vec<Value> = (0..200_000).map(|i| json!(i)).collect();
        let started = std::time::Instant::now();
        assert!(check(&s, Value::Array(items.clone())).is_empty());
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        let mut dup = items;
        dup.push(json!(199_999.0));
        assert_eq!(check(&s, Value::Array(dup)).len(), 1);
    }

    #[test]
    fn type_mismatch_skips_remaining_checks() {
        let s = Schema {
            min_length: Some(3),
            format: Some("uuid".into()),
            ..Schema::of_type(SchemaType::String)
        };
        let res = check(&s, json!(5));
        assert_eq!(res.len(), 1);
        assert_eq!(res.errors[0].message, "expected string");
    }

    #[test]
    fn independent_bounds_all_report() {
        let s = Schema {
            max_length: Some(2),
            pattern: Some(Pattern::new("^[0-9]+$").unwrap()),
            format: Some("email".into()),
            ..Schema::of_type(SchemaType::String)
        };
        let res = check(&s, json!("abc"));
        let messages: Vec<_> = res.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "expected length <= 2",
                "expected string to match pattern ^[0-9]+$",
                "expected string to be RFC 5322 email"
            ]
        );
    }

    #[test]
    fn numeric_bounds() {
        let s = Schema {
            minimum: Some(Number::from(1)),
            exclusive_maximum: Some(Number::from(10)),
            multiple_of: Some(Number::from(3)),
            ..Schema::of_type(SchemaType::Integer)
        };
        let res = check(&s, json!(0));
        assert_eq!(res.len(), 1);
        assert_eq!(res.errors[0].message, "expected number >= 1");
        let res = check(&s, json!(10));
        assert_eq!(res.len(), 2);
        assert!(check(&s, json!(9)).is_empty());
        assert!(check(&s, json!(9.0)).is_empty());
        assert_eq!(check(&s, json!(9.5)).errors[0].message, "expected integer");
    }

    #[test]
    fn nested_errors_accumulate_in_document_order() {
        let mut item = Schema::of_type(SchemaType::Object);
        item.properties.push("id", Schema::with_format(SchemaType::String, "uuid"));
        item.required.push("id".into());
        let mut s = Schema::of_type(SchemaType::Object);
        s.properties.push(
            "items",
            Schema {
                items: Some(Box::new(item)),
                ..Schema::of_type(SchemaType::Array)
            },
        );
        s.properties.push(
            "name",
            Schema {
                max_length: Some(3),
                ..Schema::of_type(SchemaType::String)
            },
        );
        let res = check(
            &s,
            json!({"items": [{"id": "67e55044-10b1-426f-9247-bb680e5fe0c8"}, {}, {"id": "x"}], "name": "toolong"}),
        );
        assert_eq!(res.locations(), vec!["body.items[1].id", "body.items[2].id", "body.name"]);
    }

    #[test]
    fn undeclared_properties() {
        let mut s = id_schema();
        assert!(check(&s, json!({"id": "a", "extra": 1})).is_empty());
        s.additional_properties = Some(AdditionalProperties::Allowed(false));
        let res = check(&s, json!({"id": "a", "extra": 1, "more": 2}));
        assert_eq!(res.locations(), vec!["body.extra", "body.more"]);
        assert_eq!(res.errors[0].message, "unexpected property");
    }

    #[test]
    fn map_values_are_validated() {
        let s = Schema {
            additional_properties: Some(AdditionalProperties::Schema(Box::new(Schema::of_type(
                SchemaType::Integer,
            )))),
            ..Schema::of_type(SchemaType::Object)
        };
        let res = check(&s, json!({"a": 1, "b": "x"}));
        assert_eq!(res.locations(), vec!["body.b"]);
    }

    #[test]
    fn read_only_not_required_on_write() {
        let mut s = id_schema();
        s.properties = Default::default();
        s.properties.push(
            "id",
            Schema {
                read_only: true,
                ..Schema::of_type(SchemaType::String)
            },
        );
        let reg = Registry::default();
        assert!(validate(&reg, &s, &json!({}), ValidateMode::WriteToServer, "").is_empty());
        let res = validate(&reg, &s, &json!({}), ValidateMode::ReadFromServer, "");
        assert_eq!(res.locations(), vec!["id"]);
    }

    #[test]
    fn nullable_accepts_null() {
        let mut s = Schema::of_type(SchemaType::String);
        assert_eq!(check(&s, Value::Null).len(), 1);
        s.make_nullable();
        assert!(check(&s, Value::Null).is_empty());
    }

    #[test]
    fn path_buffer_segments() {
        let mut p = PathBuffer::new("");
        p.push_field("a");
        p.push_index(3);
        p.push_field("b");
        assert_eq!(p.as_str(), "a[3].b");
        p.pop();
        p.pop();
        assert_eq!(p.as_str(), "a");
    }
}
