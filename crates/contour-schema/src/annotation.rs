//! # Field Annotations
//!
//! Fields carry `(key, literal)` string pairs. This module turns each pair
//! into a typed [`Annotation`], coercing the literal to the field's target
//! type. Parsing happens once per type at setup; any unknown key,
//! unparseable literal, or annotation applied to the wrong kind of field
//! is a [`SetupError`].

use serde_json::{Number, Value};

use crate::error::SetupError;
use crate::reflect::{Shape, TypeRef};
use crate::schema::Pattern;

/// Where an input field is sourced from, or where an output field goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Path(String),
    Query(String),
    Header(String),
    Cookie(String),
    /// The JSON request or response body.
    Body,
    /// The unparsed request body bytes.
    RawBody,
    /// The response status code.
    Status,
}

impl Location {
    /// Prefix for error locations, e.g. `query.num`.
    pub fn prefix(&self) -> String {
        match self {
            Self::Path(name) => format!("path.{name}"),
            Self::Query(name) => format!("query.{name}"),
            Self::Header(name) => format!("header.{name}"),
            Self::Cookie(name) => format!("cookie.{name}"),
            Self::Body | Self::RawBody => "body".to_string(),
            Self::Status => "status".to_string(),
        }
    }

    /// OpenAPI `in` value for parameter locations.
    pub fn param_in(&self) -> Option<&'static str> {
        match self {
            Self::Path(_) => Some("path"),
            Self::Query(_) => Some("query"),
            Self::Header(_) => Some("header"),
            Self::Cookie(_) => Some("cookie"),
            _ => None,
        }
    }

    /// Parameter name for parameter locations.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Path(n) | Self::Query(n) | Self::Header(n) | Self::Cookie(n) => Some(n),
            _ => None,
        }
    }
}

/// A parsed field annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Rename(String),
    OmitEmpty(bool),
    Required(bool),
    Hidden(bool),
    Doc(String),
    Format(String),
    Enum(Vec<Value>),
    Default(Value),
    Example(Value),
    Examples(Vec<Value>),
    Minimum(Number),
    ExclusiveMinimum(Number),
    Maximum(Number),
    ExclusiveMaximum(Number),
    MultipleOf(Number),
    MinLength(u64),
    MaxLength(u64),
    Pattern(Pattern),
    MinItems(u64),
    MaxItems(u64),
    UniqueItems(bool),
    MinProperties(u64),
    MaxProperties(u64),
    Nullable(bool),
    ReadOnly(bool),
    WriteOnly(bool),
    Deprecated(bool),
    Location(Location),
}

/// Coarse kind a literal is coerced into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Bool,
    Integer,
    Number,
    String,
    Array(Box<Target>),
    Object,
    Any,
}

impl Target {
    /// Classify a field type, looking through `Option` and `Box`.
    pub fn of(ty: &TypeRef) -> Self {
        let (_, def) = ty.resolve();
        match def.shape {
            Shape::Bool => Self::Bool,
            Shape::Integer { .. } => Self::Integer,
            Shape::Number { .. } => Self::Number,
            Shape::String | Shape::DateTime | Shape::Date | Shape::Uuid => Self::String,
            Shape::Any => Self::Any,
            Shape::Optional(inner) => Self::of(&inner),
            Shape::Array(item) => Self::Array(Box::new(Self::of(&item))),
            Shape::Map(_) | Shape::Object(_) => Self::Object,
            Shape::Alias(inner) => Self::of(&inner),
        }
    }

    fn is_scalar(&self) -> bool {
        matches!(self, Self::Bool | Self::Integer | Self::Number | Self::String)
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

/// Identifies the field being parsed, for error reporting.
pub(crate) struct FieldCtx<'a> {
    pub type_name: &'a str,
    pub field: &'a str,
}

impl FieldCtx<'_> {
    fn invalid(&self, key: &str, literal: &str, reason: impl Into<String>) -> SetupError {
        SetupError::invalid(self.type_name, self.field, key, literal, reason)
    }
}

/// Parse one `(key, literal)` pair for a field of kind `target`.
pub(crate) fn parse(
    ctx: &FieldCtx<'_>,
    key: &str,
    literal: &str,
    target: &Target,
) -> Result<Annotation, SetupError> {
    let flag = || parse_flag(literal).ok_or_else(|| ctx.invalid(key, literal, "expected true or false"));
    let count = || {
        literal
            .trim()
            .parse::<u64>()
            .map_err(|_| ctx.invalid(key, literal, "expected a non-negative integer"))
    };
    let require = |ok: bool, what: &str| {
        if ok {
            Ok(())
        } else {
            Err(ctx.invalid(key, literal, format!("only applies to {what} fields")))
        }
    };
    let param_name = || {
        if literal.is_empty() {
            ctx.field.to_string()
        } else {
            literal.to_string()
        }
    };

    let annotation = match key {
        "rename" => {
            if literal.is_empty() {
                return Err(ctx.invalid(key, literal, "name must not be empty"));
            }
            Annotation::Rename(literal.to_string())
        }
        "omitempty" => Annotation::OmitEmpty(flag()?),
        "required" => Annotation::Required(flag()?),
        "hidden" => Annotation::Hidden(flag()?),
        "doc" => Annotation::Doc(literal.to_string()),
        "format" => {
            require(target.is_scalar(), "scalar")?;
            Annotation::Format(literal.to_string())
        }
        "enum" => {
            let element = match target {
                Target::Array(item) => item.as_ref(),
                other => other,
            };
            require(element.is_scalar(), "scalar or scalar array")?;
            let values = split_list(literal)
                .map(|token| coerce_scalar(token, element).map_err(|r| ctx.invalid(key, literal, r)))
                .collect::<Result<Vec<_>, _>>()?;
            if values.is_empty() {
                return Err(ctx.invalid(key, literal, "enum must list at least one value"));
            }
            Annotation::Enum(values)
        }
        "default" => Annotation::Default(coerce_value(literal, target).map_err(|r| ctx.invalid(key, literal, r))?),
        "example" => Annotation::Example(coerce_value(literal, target).map_err(|r| ctx.invalid(key, literal, r))?),
        "examples" => {
            require(target.is_scalar(), "scalar")?;
            let values = split_list(literal)
                .map(|token| coerce_scalar(token, target).map_err(|r| ctx.invalid(key, literal, r)))
                .collect::<Result<Vec<_>, _>>()?;
            Annotation::Examples(values)
        }
        "minimum" | "exclusiveMinimum" | "maximum" | "exclusiveMaximum" | "multipleOf" => {
            require(target.is_numeric(), "numeric")?;
            let n = parse_number(literal).ok_or_else(|| ctx.invalid(key, literal, "expected a number"))?;
            match key {
                "minimum" => Annotation::Minimum(n),
                "exclusiveMinimum" => Annotation::ExclusiveMinimum(n),
                "maximum" => Annotation::Maximum(n),
                "exclusiveMaximum" => Annotation::ExclusiveMaximum(n),
                _ => {
                    if n.as_f64().map_or(true, |f| f <= 0.0) {
                        return Err(ctx.invalid(key, literal, "multipleOf must be greater than zero"));
                    }
                    Annotation::MultipleOf(n)
                }
            }
        }
        "minLength" | "maxLength" => {
            require(*target == Target::String, "string")?;
            let n = count()?;
            if key == "minLength" {
                Annotation::MinLength(n)
            } else {
                Annotation::MaxLength(n)
            }
        }
        "pattern" => {
            require(*target == Target::String, "string")?;
            let pattern = Pattern::new(literal).map_err(|e| ctx.invalid(key, literal, e.to_string()))?;
            Annotation::Pattern(pattern)
        }
        "minItems" | "maxItems" | "uniqueItems" => {
            require(matches!(target, Target::Array(_)), "array")?;
            match key {
                "minItems" => Annotation::MinItems(count()?),
                "maxItems" => Annotation::MaxItems(count()?),
                _ => Annotation::UniqueItems(flag()?),
            }
        }
        "minProperties" | "maxProperties" => {
            require(*target == Target::Object, "object or map")?;
            if key == "minProperties" {
                Annotation::MinProperties(count()?)
            } else {
                Annotation::MaxProperties(count()?)
            }
        }
        "nullable" => Annotation::Nullable(flag()?),
        "readOnly" => Annotation::ReadOnly(flag()?),
        "writeOnly" => Annotation::WriteOnly(flag()?),
        "deprecated" => Annotation::Deprecated(flag()?),
        "path" => Annotation::Location(Location::Path(param_name())),
        "query" => Annotation::Location(Location::Query(param_name())),
        "header" => Annotation::Location(Location::Header(param_name())),
        "cookie" => Annotation::Location(Location::Cookie(param_name())),
        "body" => Annotation::Location(Location::Body),
        "raw_body" => Annotation::Location(Location::RawBody),
        "status" => {
            require(*target == Target::Integer, "integer")?;
            Annotation::Location(Location::Status)
        }
        _ => {
            return Err(SetupError::UnknownAnnotation {
                type_name: ctx.type_name.to_string(),
                field: ctx.field.to_string(),
                key: key.to_string(),
            })
        }
    };
    Ok(annotation)
}

/// An empty literal counts as `true`, so `("omitempty", "")` reads naturally.
fn parse_flag(literal: &str) -> Option<bool> {
    match literal.trim() {
        "" | "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn split_list(literal: &str) -> impl Iterator<Item = &str> {
    literal.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Parse a numeric literal, keeping integers integral.
pub(crate) fn parse_number(literal: &str) -> Option<Number> {
    let literal = literal.trim();
    if let Ok(i) = literal.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = literal.parse::<u64>() {
        return Some(Number::from(u));
    }
    literal.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Coerce a raw token to a scalar JSON value of the target kind.
pub fn coerce_scalar(token: &str, target: &Target) -> Result<Value, String> {
    match target {
        Target::String => Ok(Value::String(token.to_string())),
        Target::Bool => token
            .trim()
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| "expected boolean".to_string()),
        Target::Integer => {
            let t = token.trim();
            t.parse::<i64>()
                .map(Value::from)
                .or_else(|_| t.parse::<u64>().map(Value::from))
                .map_err(|_| "expected integer".to_string())
        }
        Target::Number => parse_number(token)
            .map(Value::Number)
            .ok_or_else(|| "expected number".to_string()),
        Target::Array(_) | Target::Object | Target::Any => {
            Err("expected a scalar target".to_string())
        }
    }
}

/// Coerce a `default`/`example` literal: scalars directly, composites as JSON.
fn coerce_value(literal: &str, target: &Target) -> Result<Value, String> {
    match target {
        Target::Array(_) => match serde_json::from_str::<Value>(literal) {
            Ok(v @ Value::Array(_)) => Ok(v),
            Ok(_) => Err("expected a JSON array".to_string()),
            Err(e) => Err(format!("invalid JSON: {e}")),
        },
        Target::Object => match serde_json::from_str::<Value>(literal) {
            Ok(v @ Value::Object(_)) => Ok(v),
            Ok(_) => Err("expected a JSON object".to_string()),
            Err(e) => Err(format!("invalid JSON: {e}")),
        },
        Target::Any => Ok(serde_json::from_str(literal).unwrap_or_else(|_| Value::String(literal.to_string()))),
        scalar => coerce_scalar(literal, scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> FieldCtx<'static> {
        FieldCtx {
            type_name: "Greeting",
            field: "num",
        }
    }

    #[test]
    fn numeric_bounds_parse_for_integers() {
        let a = parse(&ctx(), "minimum", "1", &Target::Integer).unwrap();
        assert_eq!(a, Annotation::Minimum(Number::from(1)));
        let a = parse(&ctx(), "maximum", "2.5", &Target::Number).unwrap();
        assert_eq!(a, Annotation::Maximum(Number::from_f64(2.5).unwrap()));
    }

    #[test]
    fn non_numeric_minimum_is_rejected() {
        let err = parse(&ctx(), "minimum", "abc", &Target::Integer).unwrap_err();
        assert!(matches!(err, SetupError::InvalidAnnotation { .. }), "{err}");
    }

    #[test]
    fn bound_on_wrong_kind_is_rejected() {
        let err = parse(&ctx(), "minLength", "1", &Target::Integer).unwrap_err();
        assert!(err.to_string().contains("only applies to string"));
        let err = parse(&ctx(), "minItems", "1", &Target::String).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn enum_is_coerced_to_field_type() {
        let a = parse(&ctx(), "enum", "1, 2,3", &Target::Integer).unwrap();
        assert_eq!(a, Annotation::Enum(vec![json!(1), json!(2), json!(3)]));
        let err = parse(&ctx(), "enum", "1,x", &Target::Integer).unwrap_err();
        assert!(err.to_string().contains("expected integer"));
    }

    #[test]
    fn enum_on_array_uses_element_type() {
        let target = Target::Array(Box::new(Target::String));
        let a = parse(&ctx(), "enum", "a,b", &target).unwrap();
        assert_eq!(a, Annotation::Enum(vec![json!("a"), json!("b")]));
    }

    #[test]
    fn default_composites_parse_as_json() {
        let target = Target::Array(Box::new(Target::Integer));
        let a = parse(&ctx(), "default", "[1,2]", &target).unwrap();
        assert_eq!(a, Annotation::Default(json!([1, 2])));
        assert!(parse(&ctx(), "default", "{", &Target::Object).is_err());
    }

    #[test]
    fn flags_accept_empty_literal() {
        assert_eq!(
            parse(&ctx(), "omitempty", "", &Target::String).unwrap(),
            Annotation::OmitEmpty(true)
        );
        assert!(parse(&ctx(), "readOnly", "yes", &Target::String).is_err());
    }

    #[test]
    fn location_defaults_to_field_name() {
        assert_eq!(
            parse(&ctx(), "query", "", &Target::Integer).unwrap(),
            Annotation::Location(Location::Query("num".into()))
        );
        assert_eq!(
            parse(&ctx(), "header", "If-Match", &Target::String).unwrap(),
            Annotation::Location(Location::Header("If-Match".into()))
        );
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(parse(&ctx(), "pattern", "(", &Target::String).is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = parse(&ctx(), "yaml", "x", &Target::String).unwrap_err();
        assert!(matches!(err, SetupError::UnknownAnnotation { .. }));
    }

    #[test]
    fn multiple_of_must_be_positive() {
        assert!(parse(&ctx(), "multipleOf", "0", &Target::Integer).is_err());
        assert!(parse(&ctx(), "multipleOf", "3", &Target::Integer).is_ok());
    }

    #[test]
    fn location_prefixes() {
        assert_eq!(Location::Path("id".into()).prefix(), "path.id");
        assert_eq!(Location::Body.prefix(), "body");
        assert_eq!(Location::Header("ETag".into()).param_in(), Some("header"));
    }
}
