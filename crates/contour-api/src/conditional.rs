//! # Conditional Requests
//!
//! Embeddable input fields for `If-Match`, `If-None-Match`,
//! `If-Modified-Since` and `If-Unmodified-Since`, plus the precondition
//! check handlers run against the current resource state.
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct GetThing {
//!     id: String,
//!     #[serde(flatten)]
//!     conditional: conditional::Params,
//! }
//!
//! impl Reflect for GetThing {
//!     fn reflect() -> TypeDef {
//!         TypeDef::object()
//!             .field::<String>("id", &[("path", "id")])
//!             .embed::<conditional::Params>()
//!     }
//! }
//! ```
//!
//! A failed check on a read (`GET`/`HEAD`) is `304 Not Modified`; on any
//! other method it is `412 Precondition Failed`.

use axum::http::Method;
use chrono::{DateTime, Utc};
use contour_schema::{Reflect, TypeDef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Conditional request headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_none_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_modified_since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_unmodified_since: Option<String>,
}

impl Reflect for Params {
    fn reflect() -> TypeDef {
        TypeDef::object()
            .field::<Option<String>>(
                "if_match",
                &[
                    ("header", "If-Match"),
                    ("doc", "Succeeds if the server's resource matches one of the passed values."),
                ],
            )
            .field::<Option<String>>(
                "if_none_match",
                &[
                    ("header", "If-None-Match"),
                    ("doc", "Succeeds if the server's resource matches none of the passed values."),
                ],
            )
            .field::<Option<String>>(
                "if_modified_since",
                &[
                    ("header", "If-Modified-Since"),
                    ("doc", "Succeeds if the server's resource date is more recent than the passed date."),
                ],
            )
            .field::<Option<String>>(
                "if_unmodified_since",
                &[
                    ("header", "If-Unmodified-Since"),
                    ("doc", "Succeeds if the server's resource date is older or the same as the passed date."),
                ],
            )
    }
}

impl Params {
    /// True if the client sent any conditional header.
    pub fn has_conditional_params(&self) -> bool {
        self.if_match.is_some()
            || self.if_none_match.is_some()
            || self.if_modified_since.is_some()
            || self.if_unmodified_since.is_some()
    }

    /// Check the preconditions against the resource's current `etag` and
    /// modification time.
    pub fn check_preconditions(
        &self,
        method: &Method,
        etag: &str,
        modified: Option<DateTime<Utc>>,
    ) -> Result<(), ApiError> {
        let mut failures = Vec::new();

        if let Some(header) = &self.if_match {
            if !matches_any(header, etag) {
                failures.push(format!("If-Match: {header} does not match current ETag"));
            }
        }
        if let Some(header) = &self.if_none_match {
            if matches_any(header, etag) {
                failures.push(format!("If-None-Match: {header} matches current ETag"));
            }
        }

        // Date checks are ignored when the matching ETag header is present.
        if let (Some(header), None, Some(modified)) = (&self.if_modified_since, &self.if_none_match, modified) {
            let since = parse_http_date(header, "If-Modified-Since")?;
            if modified <= since {
                failures.push(format!("If-Modified-Since: resource unchanged since {header}"));
            }
        }
        if let (Some(header), None, Some(modified)) = (&self.if_unmodified_since, &self.if_match, modified) {
            let since = parse_http_date(header, "If-Unmodified-Since")?;
            if modified > since {
                failures.push(format!("If-Unmodified-Since: resource modified after {header}"));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        if *method == Method::GET || *method == Method::HEAD {
            Err(ApiError::NotModified)
        } else {
            Err(ApiError::PreconditionFailed(failures.join("; ")))
        }
    }
}

/// `*` or any listed tag equal to `etag`, ignoring weak prefixes and quotes.
fn matches_any(header: &str, etag: &str) -> bool {
    let current = normalize_tag(etag);
    header
        .split(',')
        .map(str::trim)
        .any(|tag| tag == "*" || normalize_tag(tag) == current)
}

fn normalize_tag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"')
}

fn parse_http_date(value: &str, header: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::invalid("expected HTTP date", format!("header.{header}")))
}

/// Format a timestamp as an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Strong ETag for a JSON representation: quoted hex SHA-256 of its
/// serialized form.
pub fn etag_for(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("\"{hex}\"")
}
