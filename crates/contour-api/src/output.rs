//! # Response Rendering
//!
//! An [`OutputPlan`] maps the handler's output struct onto a response:
//! `header` fields become response headers, the `status` field sets the
//! status code and the `body` field is written as JSON. Output types may
//! not use request-only locations.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use contour_schema::{field_schema, Location, Registry, Schema, Shape, TypeRef};
use serde_json::Value;

use crate::conditional::http_date;
use crate::context::Response;
use crate::error::{ApiError, SetupError};
use crate::operation::Operation;

/// One response header sourced from an output field.
#[derive(Debug, Clone)]
pub struct HeaderPlan {
    pub field: String,
    pub name: HeaderName,
    /// Date-time fields are written as HTTP dates.
    pub http_date: bool,
}

/// Precomputed rendering for one output type.
#[derive(Debug, Clone)]
pub struct OutputPlan {
    pub headers: Vec<HeaderPlan>,
    pub status_field: Option<String>,
    pub body_field: Option<String>,
    /// Schema of the body field, used for documentation and by the patch
    /// generator to validate candidates.
    pub body_schema: Option<Schema>,
    pub default_status: StatusCode,
}

impl OutputPlan {
    pub fn build(registry: &Registry, ty: TypeRef, operation: &Operation) -> Result<Self, SetupError> {
        let info = registry.introspect(ty)?;

        let mut headers = Vec::new();
        let mut status_field = None;
        for field in &info.fields {
            match &field.location {
                Some(Location::Header(name)) => {
                    let name = HeaderName::try_from(name.as_str()).map_err(|_| {
                        SetupError::invalid(&operation.id, format!("invalid response header name '{name}'"))
                    })?;
                    headers.push(HeaderPlan {
                        field: field.json_name.clone(),
                        name,
                        http_date: is_date_time(field.ty),
                    });
                }
                Some(Location::Status) => status_field = Some(field.json_name.clone()),
                Some(other) => {
                    return Err(SetupError::invalid(
                        &operation.id,
                        format!(
                            "output field '{}' uses request-only location {}",
                            field.name,
                            other.prefix()
                        ),
                    ))
                }
                None => {
                    return Err(SetupError::invalid(
                        &operation.id,
                        format!("output field '{}' has no response location", field.name),
                    ))
                }
            }
        }
        if let Some(raw) = &info.raw_body {
            return Err(SetupError::invalid(
                &operation.id,
                format!("output field '{}' cannot be a raw body", raw.name),
            ));
        }

        let (body_field, body_schema) = match &info.body {
            Some(field) => (Some(field.json_name.clone()), Some(field_schema(registry, field)?)),
            None => (None, None),
        };

        let fallback = if body_field.is_some() {
            StatusCode::OK
        } else {
            StatusCode::NO_CONTENT
        };
        let default_status = match operation.default_status {
            Some(code) => StatusCode::from_u16(code)
                .map_err(|_| SetupError::invalid(&operation.id, format!("invalid default status {code}")))?,
            None => fallback,
        };

        Ok(Self {
            headers,
            status_field,
            body_field,
            body_schema,
            default_status,
        })
    }

    /// Render a serialized output value.
    pub fn render(&self, output: Value) -> Result<Response, ApiError> {
        let Value::Object(mut fields) = output else {
            return Err(ApiError::Internal("handler output did not serialize to an object".into()));
        };

        let status = match self.status_field.as_ref().and_then(|f| fields.get(f)) {
            Some(Value::Number(n)) if n.as_u64().is_some_and(|c| c != 0) => n
                .as_u64()
                .and_then(|c| u16::try_from(c).ok())
                .and_then(|c| StatusCode::from_u16(c).ok())
                .ok_or_else(|| ApiError::Internal(format!("handler returned invalid status {n}")))?,
            _ => self.default_status,
        };

        let body = self
            .body_field
            .as_ref()
            .and_then(|f| fields.remove(f))
            .filter(|v| !v.is_null());
        let mut response = match body {
            Some(value) => Response::json(status, &value),
            None => Response::new(status),
        };

        for header in &self.headers {
            let Some(text) = fields.get(&header.field).and_then(|v| header_text(v, header.http_date)) else {
                continue;
            };
            let value = HeaderValue::try_from(text)
                .map_err(|_| ApiError::Internal(format!("invalid value for header {}", header.name)))?;
            response.headers.insert(header.name.clone(), value);
        }
        Ok(response)
    }
}

fn is_date_time(ty: TypeRef) -> bool {
    match ty.resolve().1.shape {
        Shape::DateTime => true,
        Shape::Optional(inner) => is_date_time(inner),
        _ => false,
    }
}

fn header_text(value: &Value, http_date_format: bool) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if http_date_format => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| http_date(dt.with_timezone(&chrono::Utc)))
            .ok()
            .or_else(|| Some(s.clone())),
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(|v| header_text(v, http_date_format)).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use contour_schema::{Reflect, TypeDef};
    use serde_json::json;

    struct Greeting;
    impl Reflect for Greeting {
        fn reflect() -> TypeDef {
            TypeDef::object().field::<String>("message", &[])
        }
    }

    struct Output;
    impl Reflect for Output {
        fn reflect() -> TypeDef {
            TypeDef::object()
                .field::<String>("etag", &[("header", "ETag")])
                .field::<Option<chrono::DateTime<Utc>>>("last_modified", &[("header", "Last-Modified")])
                .field::<Vec<String>>("links", &[("header", "Link")])
                .field::<u16>("status", &[("status", "")])
                .field::<Greeting>("body", &[("body", "")])
        }
    }

    struct NoBody;
    impl Reflect for NoBody {
        fn reflect() -> TypeDef {
            TypeDef::object()
        }
    }

    fn plan<T: Reflect>(op: Operation) -> OutputPlan {
        OutputPlan::build(&Registry::default(), TypeRef::of::<T>(), &op).unwrap()
    }

    #[test]
    fn renders_headers_status_and_body() {
        let plan = plan::<Output>(Operation::get("get-x", "/x"));
        let modified = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        let res = plan
            .render(json!({
                "etag": "\"abc\"",
                "last_modified": modified,
                "links": ["</a>", "</b>"],
                "status": 201,
                "body": {"message": "hi"},
            }))
            .unwrap();
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.header("etag"), Some("\"abc\""));
        assert_eq!(res.header("last-modified"), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(res.header("link"), Some("</a>, </b>"));
        assert_eq!(&res.body[..], br#"{"message":"hi"}"#);
    }

    #[test]
    fn zero_status_falls_back_to_default() {
        let plan = plan::<Output>(Operation::post("post-x", "/x").default_status(202));
        let res = plan
            .render(json!({"etag": "e", "last_modified": null, "links": [], "status": 0, "body": {"message": ""}}))
            .unwrap();
        assert_eq!(res.status, StatusCode::ACCEPTED);
        assert!(res.header("last-modified").is_none());
        assert!(res.header("link").is_none());
    }

    #[test]
    fn bodiless_output_is_no_content() {
        let plan = plan::<NoBody>(Operation::delete("delete-x", "/x"));
        let res = plan.render(json!({})).unwrap();
        assert_eq!(res.status, StatusCode::NO_CONTENT);
        assert!(res.body.is_empty());
    }

    #[test]
    fn request_locations_are_rejected() {
        struct Bad;
        impl Reflect for Bad {
            fn reflect() -> TypeDef {
                TypeDef::object().field::<String>("id", &[("query", "id")])
            }
        }
        let err = OutputPlan::build(&Registry::default(), TypeRef::of::<Bad>(), &Operation::get("g", "/g"))
            .unwrap_err();
        assert!(err.to_string().contains("request-only location query.id"));
    }
}
