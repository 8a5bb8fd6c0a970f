//! # Request Binding
//!
//! An [`InputPlan`] is computed once per operation from the input type's
//! field list. At request time it reads every located field (path, query,
//! header, cookie), coerces the raw text to the field's kind, validates it
//! under its location prefix, then decodes and validates the JSON body
//! under `body`. All failures are collected into one 422.
//!
//! The bound value is a JSON object keyed by the input type's JSON names,
//! ready for `serde_json::from_value`.
//!
//! Query, header and cookie parameters are optional unless annotated
//! `required`; give them an `Option` type or a `default`.
//!
//! ## Resolvers
//!
//! A body type's [`Resolver`] runs under `body` once the body passes its
//! schema, even when parameters failed. The input type's resolver runs
//! with an empty prefix once everything else passed. Both report into the
//! same 422.
//!
//! ## Precedence
//!
//! 413 wins over everything. A body that is not JSON (415) or does not
//! parse (400) is reported alone: parameter errors found so far are
//! dropped, since the client has to resend the request anyway.

use contour_schema::annotation::coerce_scalar;
use contour_schema::validate::validate_into;
use contour_schema::{
    defaults, field_schema, resolver_of, ErrorDetail, Location, PathBuffer, Registry, Resolver, Schema,
    Target, TypeRef, ValidateMode, ValidateResult,
};
use serde_json::{Map, Value};

use crate::context::Request;
use crate::error::{ApiError, SetupError};
use crate::operation::Operation;

/// One parameter read from the request line or headers.
#[derive(Debug, Clone)]
pub struct ParamPlan {
    /// Key in the bound object (the field's JSON name).
    pub field: String,
    pub location: Location,
    pub schema: Schema,
    pub target: Target,
    pub required: bool,
    pub default: Option<Value>,
}

/// The JSON body field.
#[derive(Debug, Clone)]
pub struct BodyPlan {
    pub field: String,
    pub schema: Schema,
    pub required: bool,
    pub resolver: Option<Resolver>,
}

/// The raw body field: bytes or text.
#[derive(Debug, Clone)]
pub struct RawBodyPlan {
    pub field: String,
    pub text: bool,
}

/// Precomputed binding for one input type.
#[derive(Debug, Clone)]
pub struct InputPlan {
    pub params: Vec<ParamPlan>,
    pub body: Option<BodyPlan>,
    pub raw_body: Option<RawBodyPlan>,
    /// The input type's own resolver.
    pub resolver: Option<Resolver>,
}

impl InputPlan {
    /// Derive the plan for `ty` as the input of `operation`.
    pub fn build(registry: &Registry, ty: TypeRef, operation: &Operation) -> Result<Self, SetupError> {
        let info = registry.introspect(ty)?;
        let path_params = operation.path_params();

        let mut params = Vec::with_capacity(info.fields.len());
        for field in &info.fields {
            let location = match &field.location {
                Some(loc) if loc.param_in().is_some() => loc.clone(),
                Some(_) => {
                    return Err(SetupError::invalid(
                        &operation.id,
                        format!("input field '{}' cannot be bound to the response status", field.name),
                    ))
                }
                None => {
                    return Err(SetupError::invalid(
                        &operation.id,
                        format!("input field '{}' has no request location", field.name),
                    ))
                }
            };
            if matches!(field.target, Target::Object) {
                return Err(SetupError::invalid(
                    &operation.id,
                    format!("parameter '{}' must be a scalar or a list of scalars", field.name),
                ));
            }
            if let Location::Path(name) = &location {
                if !path_params.contains(&name.as_str()) {
                    return Err(SetupError::invalid(
                        &operation.id,
                        format!("path parameter '{name}' does not appear in '{}'", operation.path),
                    ));
                }
            }
            params.push(ParamPlan {
                field: field.json_name.clone(),
                schema: field_schema(registry, field)?,
                target: field.target.clone(),
                required: field.required,
                default: field.default_value().cloned(),
                location,
            });
        }

        for name in &path_params {
            let bound = params
                .iter()
                .any(|p| matches!(&p.location, Location::Path(n) if n == name));
            if !bound {
                return Err(SetupError::invalid(
                    &operation.id,
                    format!("path parameter '{name}' has no input field"),
                ));
            }
        }

        let body = match &info.body {
            Some(field) => Some(BodyPlan {
                field: field.json_name.clone(),
                schema: field_schema(registry, field)?,
                required: field.required,
                resolver: resolver_of(field.ty),
            }),
            None => None,
        };

        let raw_body = match &info.raw_body {
            Some(field) => {
                let text = match &field.target {
                    Target::String => true,
                    Target::Array(inner) if **inner == Target::Integer => false,
                    _ => {
                        return Err(SetupError::invalid(
                            &operation.id,
                            format!("raw body field '{}' must be String or Vec<u8>", field.name),
                        ))
                    }
                };
                Some(RawBodyPlan { field: field.json_name.clone(), text })
            }
            None => None,
        };

        Ok(Self {
            params,
            body,
            raw_body,
            resolver: resolver_of(ty),
        })
    }

    /// Bind `req` into a JSON object keyed by input field names.
    pub fn bind(&self, registry: &Registry, req: &Request, max_body_bytes: usize) -> Result<Value, ApiError> {
        if req.body.len() > max_body_bytes {
            return Err(ApiError::PayloadTooLarge { limit: max_body_bytes });
        }

        let mut out = Map::new();
        let mut result = ValidateResult::default();

        for param in &self.params {
            let prefix = param.location.prefix();
            let Some(raw) = read_param(req, param) else {
                if let Some(default) = &param.default {
                    out.insert(param.field.clone(), default.clone());
                } else if param.required {
                    let kind = param.location.param_in().unwrap_or("request");
                    result
                        .errors
                        .push(ErrorDetail::new(format!("required {kind} parameter is missing"), prefix, None));
                }
                continue;
            };
            match coerce_param(&raw, &param.target) {
                Ok(value) => {
                    let mut path = PathBuffer::new(&prefix);
                    validate_into(registry, &param.schema, &value, ValidateMode::WriteToServer, &mut path, &mut result);
                    out.insert(param.field.clone(), value);
                }
                Err(message) => result
                    .errors
                    .push(ErrorDetail::new(message, prefix, Some(Value::String(raw)))),
            }
        }

        if let Some(raw) = &self.raw_body {
            let value = if raw.text {
                let text = std::str::from_utf8(&req.body)
                    .map_err(|_| ApiError::BadRequest("request body is not valid UTF-8".to_string()))?;
                Value::String(text.to_string())
            } else {
                Value::Array(req.body.iter().map(|b| Value::from(*b)).collect())
            };
            out.insert(raw.field.clone(), value);
        }

        if let Some(body) = &self.body {
            if req.body.iter().all(u8::is_ascii_whitespace) {
                if body.required {
                    result
                        .errors
                        .push(ErrorDetail::new("request body is required", "body", None));
                } else {
                    out.insert(body.field.clone(), Value::Null);
                }
            } else {
                check_json_content_type(req)?;
                let mut value: Value = serde_json::from_slice(&req.body)
                    .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
                let mut path = PathBuffer::new("body");
                let before = result.errors.len();
                validate_into(registry, &body.schema, &value, ValidateMode::WriteToServer, &mut path, &mut result);
                if result.errors.len() == before {
                    defaults::apply(registry, &body.schema, &mut value);
                    if let Some(resolver) = &body.resolver {
                        resolver.run(&value, &mut path, &mut result);
                    }
                }
                out.insert(body.field.clone(), value);
            }
        }

        let out = Value::Object(out);
        if result.is_empty() {
            if let Some(resolver) = &self.resolver {
                resolver.run(&out, &mut PathBuffer::new(""), &mut result);
            }
        }
        if !result.is_empty() {
            return Err(ApiError::Validation(result.into_errors()));
        }
        Ok(out)
    }
}

fn read_param(req: &Request, param: &ParamPlan) -> Option<String> {
    let raw = match &param.location {
        Location::Path(name) => req.param(name).map(str::to_string),
        Location::Query(name) => {
            let values = req.query_values(name);
            match (&param.target, values.is_empty()) {
                (_, true) => None,
                // Repeated keys and comma lists are equivalent for arrays.
                (Target::Array(_), false) => Some(values.join(",")),
                (_, false) => values.into_iter().next(),
            }
        }
        Location::Header(name) => req.header(name).map(str::to_string),
        Location::Cookie(name) => req.cookie(name),
        Location::Body | Location::RawBody | Location::Status => None,
    };
    // An empty value only means something for strings.
    raw.filter(|s| !s.is_empty() || param.target == Target::String)
}

/// Coerce parameter text to the field's kind. Arrays are comma-split.
fn coerce_param(raw: &str, target: &Target) -> Result<Value, String> {
    match target {
        Target::Array(inner) => raw
            .split(',')
            .map(|item| coerce_param(item.trim(), inner))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Target::Any | Target::Object => Ok(Value::String(raw.to_string())),
        scalar => coerce_scalar(raw, scalar),
    }
}

fn check_json_content_type(req: &Request) -> Result<(), ApiError> {
    match req.content_type() {
        None => Ok(()),
        Some(ct) if ct == "application/json" || ct.ends_with("+json") => Ok(()),
        Some(ct) => Err(ApiError::UnsupportedMediaType(ct)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Uri};
    use contour_schema::{Reflect, TypeDef};
    use serde_json::json;

    struct Payload;
    impl Reflect for Payload {
        fn reflect() -> TypeDef {
            TypeDef::object()
                .field::<String>("suffix", &[("maxLength", "5"), ("default", "!")])
                .field::<u32>("count", &[])
        }
    }

    struct Input;
    impl Reflect for Input {
        fn reflect() -> TypeDef {
            TypeDef::object()
                .field::<String>("id", &[("path", "id"), ("maxLength", "10")])
                .field::<i64>("num", &[("query", "num"), ("minimum", "0"), ("default", "7")])
                .field::<Vec<String>>("tags", &[("query", "tags")])
                .field::<Option<String>>("trace", &[("header", "X-Trace")])
                .field::<Payload>("body", &[("body", "")])
        }
    }

    fn plan(registry: &Registry) -> InputPlan {
        InputPlan::build(registry, TypeRef::of::<Input>(), &Operation::post("post-input", "/in/{id}")).unwrap()
    }

    fn request(uri: &'static str, body: &'static str) -> Request {
        let mut req = Request::new(Method::POST, Uri::from_static(uri)).with_body(body);
        req.params.insert("id".into(), "abc".into());
        req
    }

    #[test]
    fn binds_params_body_and_defaults() {
        let registry = Registry::default();
        let bound = plan(&registry)
            .bind(&registry, &request("/in/abc?tags=a,b&tags=c", r#"{"count": 2}"#), 1024)
            .unwrap();
        assert_eq!(
            bound,
            json!({
                "id": "abc",
                "num": 7,
                "tags": ["a", "b", "c"],
                "body": {"count": 2, "suffix": "!"}
            })
        );
    }

    #[test]
    fn collects_param_and_body_errors_together() {
        let registry = Registry::default();
        let err = plan(&registry)
            .bind(&registry, &request("/in/abc?num=-1", r#"{"suffix": "toolong"}"#), 1024)
            .unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let locations: Vec<_> = errors.iter().map(|e| e.location.as_str()).collect();
        assert_eq!(locations, vec!["query.num", "body.count", "body.suffix"]);
    }

    #[test]
    fn unparseable_param_is_reported_with_raw_value() {
        let registry = Registry::default();
        let err = plan(&registry)
            .bind(&registry, &request("/in/abc?num=seven", r#"{"count": 1}"#), 1024)
            .unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected integer");
        assert_eq!(errors[0].value, Some(json!("seven")));
    }

    #[test]
    fn body_failures_map_to_status() {
        let registry = Registry::default();
        let plan = plan(&registry);
        assert!(matches!(
            plan.bind(&registry, &request("/in/abc", "{nope"), 1024),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            plan.bind(&registry, &request("/in/abc", r#"{"count": 1}"#), 4),
            Err(ApiError::PayloadTooLarge { limit: 4 })
        ));
        let Err(ApiError::Validation(errors)) = plan.bind(&registry, &request("/in/abc", ""), 1024) else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].location, "body");
        let xml = request("/in/abc", "<x/>").with_header("content-type", "application/xml");
        assert!(matches!(
            plan.bind(&registry, &xml, 1024),
            Err(ApiError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn unreadable_body_is_reported_without_param_errors() {
        let registry = Registry::default();
        let plan = plan(&registry);
        assert!(matches!(
            plan.bind(&registry, &request("/in/abc?num=-1", "{nope"), 1024),
            Err(ApiError::BadRequest(_))
        ));
        let xml = request("/in/abc?num=seven", "<x/>").with_header("content-type", "application/xml");
        assert!(matches!(
            plan.bind(&registry, &xml, 1024),
            Err(ApiError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn unbound_path_parameter_is_a_setup_error() {
        let registry = Registry::default();
        let err = InputPlan::build(&registry, TypeRef::of::<Input>(), &Operation::post("x", "/in/{other}"))
            .unwrap_err();
        assert!(matches!(err, SetupError::InvalidOperation { .. }));
    }

    #[test]
    fn unlocated_input_field_is_a_setup_error() {
        let registry = Registry::default();
        let err = InputPlan::build(&registry, TypeRef::of::<Payload>(), &Operation::post("x", "/p")).unwrap_err();
        assert!(err.to_string().contains("no request location"));
    }
}
