//! # API Error Types
//!
//! [`ApiError`] is the request-time error: every variant maps to one HTTP
//! status and a structured JSON body. [`SetupError`] is the startup-time
//! error: schema defects plus operation registration defects. Setup errors
//! are never turned into responses.
//!
//! Internal error messages are logged, never returned to the client.

use axum::http::StatusCode;
use contour_schema::ErrorDetail as FieldError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Response;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

/// Inner error payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Field-level validation failures, present only for 422 responses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldErrorBody>,
}

/// Wire form of one validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldErrorBody {
    pub message: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl From<FieldError> for FieldErrorBody {
    fn from(err: FieldError) -> Self {
        Self {
            message: err.message,
            location: err.location,
            value: err.value,
        }
    }
}

/// Request-time error with an HTTP mapping.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// One or more validation failures (422).
    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// Request body media type is not accepted (415).
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Request body exceeds the configured limit (413).
    #[error("request body too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// A conditional write precondition failed (412).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A conditional read matched; nothing to send (304).
    #[error("not modified")]
    NotModified,

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Single validation failure at `location`.
    pub fn invalid(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(message, location, None)])
    }

    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            Self::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::PreconditionFailed(_) => {
                (StatusCode::PRECONDITION_FAILED, "PRECONDITION_FAILED")
            }
            Self::NotModified => (StatusCode::NOT_MODIFIED, "NOT_MODIFIED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let (status, code) = err.status_and_code();
        if status == StatusCode::NOT_MODIFIED {
            return Response::new(status);
        }

        // Never expose internal error messages to clients.
        if matches!(&err, ApiError::Internal(_)) {
            tracing::error!(error = %err, "internal server error");
        }
        let message = match &err {
            ApiError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        let details = match err {
            ApiError::Validation(errors) => errors.into_iter().map(FieldErrorBody::from).collect(),
            _ => Vec::new(),
        };

        let body = ErrorBody {
            error: ErrorPayload {
                code: code.to_string(),
                message,
                details,
            },
        };
        Response::json(status, &body)
    }
}

/// Startup-time configuration error. Fatal; never mapped to a response.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Schema derivation failed for an input or output type.
    #[error(transparent)]
    Schema(#[from] contour_schema::SetupError),

    /// Two operations share an id.
    #[error("duplicate operation id '{0}'")]
    DuplicateOperation(String),

    /// The router cannot serve this method.
    #[error("unsupported method {method} for operation '{operation}'")]
    UnsupportedMethod { operation: String, method: String },

    /// The operation or its input/output types are malformed.
    #[error("invalid operation '{operation}': {reason}")]
    InvalidOperation { operation: String, reason: String },
}

impl SetupError {
    pub(crate) fn invalid(operation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(res: &Response) -> serde_json::Value {
        serde_json::from_slice(&res.body).unwrap()
    }

    #[test]
    fn validation_status_code() {
        let (status, code) = ApiError::Validation(vec![]).status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn conditional_status_codes() {
        assert_eq!(ApiError::NotModified.status_and_code().0, StatusCode::NOT_MODIFIED);
        assert_eq!(
            ApiError::PreconditionFailed("etag".into()).status_and_code().0,
            StatusCode::PRECONDITION_FAILED
        );
    }

    #[test]
    fn validation_details_are_in_body() {
        let err = ApiError::Validation(vec![
            FieldError::new("expected string", "body.id", Some(serde_json::json!(1))),
            FieldError::new("expected required property name to be present", "body.name", None),
        ]);
        let res = Response::from(err);
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_of(&res);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"][0]["location"], "body.id");
        assert_eq!(body["error"]["details"][0]["value"], 1);
        assert!(body["error"]["details"][1].get("value").is_none());
    }

    #[test]
    fn internal_message_is_hidden() {
        let res = Response::from(ApiError::Internal("db password wrong".into()));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(&res);
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(!String::from_utf8_lossy(&res.body).contains("password"));
    }

    #[test]
    fn not_modified_has_no_body() {
        let res = Response::from(ApiError::NotModified);
        assert!(res.body.is_empty());
    }

    #[test]
    fn setup_error_wraps_schema_error() {
        let err: SetupError = contour_schema::SetupError::NotAnObject {
            type_name: "u8".into(),
        }
        .into();
        assert!(err.to_string().contains("u8"));
    }
}
