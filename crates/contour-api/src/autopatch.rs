//! # Automatic PATCH
//!
//! For every path with a GET and a PUT but no PATCH, [`auto_patch`]
//! registers a PATCH operation that:
//!
//! 1. picks a patch strategy from the request `Content-Type`,
//! 2. calls the GET handler with the same parameters and headers,
//! 3. applies the patch to the returned JSON body,
//! 4. returns `304` if nothing changed,
//! 5. validates the candidate against GET's body schema,
//! 6. calls the PUT handler with the candidate, turning GET's `ETag` and
//!    `Last-Modified` into `If-Match` and `If-Unmodified-Since` unless the
//!    client sent its own.
//!
//! A patch that fails to parse, apply or validate never reaches PUT.
//!
//! Each path is evaluated once at setup:
//! `NoPatch → PatchNeeded → PatchRegistered`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::header::{
    CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    IF_UNMODIFIED_SINCE, LAST_MODIFIED,
};
use axum::http::{HeaderValue, Method};
use contour_schema::validate::json_eq;
use contour_schema::{validate, Registry, Schema, SchemaType, ValidateMode};
use serde_json::Value;

use crate::adapter::{handler_fn, Adapter, Handler};
use crate::api::{Api, RegisteredOperation};
use crate::context::{Request, Response};
use crate::error::{ApiError, SetupError};
use crate::openapi::{MediaTypeDoc, OperationDoc, RequestBodyDoc};
use crate::operation::Operation;
use crate::patch::{self, PatchKind, JSON_PATCH, MERGE_PATCH, MERGE_SHORTHAND};

/// Per-path patch state, decided once at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    /// No GET+PUT pair, or PATCH already declared.
    NoPatch,
    /// GET and PUT exist, PATCH does not.
    PatchNeeded,
    /// A PATCH operation was generated.
    PatchRegistered,
}

/// Classify one path from the methods registered on it. Only
/// [`auto_patch`] moves a path on to [`PatchState::PatchRegistered`].
pub fn state_for(methods: &[Method]) -> PatchState {
    let has = |m: Method| methods.contains(&m);
    if has(Method::PATCH) || !has(Method::GET) || !has(Method::PUT) {
        PatchState::NoPatch
    } else {
        PatchState::PatchNeeded
    }
}

/// Generate PATCH operations for every eligible path. Returns the final
/// state of every registered path.
pub fn auto_patch<A: Adapter>(api: &mut Api<A>) -> Result<BTreeMap<String, PatchState>, SetupError> {
    let mut by_path: BTreeMap<String, Vec<RegisteredOperation>> = BTreeMap::new();
    for registered in api.operations() {
        by_path
            .entry(registered.operation.path.clone())
            .or_default()
            .push(registered.clone());
    }

    let mut states = BTreeMap::new();
    for (path, ops) in by_path {
        let methods: Vec<Method> = ops.iter().map(|r| r.operation.method.clone()).collect();
        let state = state_for(&methods);
        states.insert(path.clone(), state);
        if state != PatchState::PatchNeeded {
            continue;
        }
        let find = |m: Method| ops.iter().find(|r| r.operation.method == m);
        let (Some(get), Some(put)) = (find(Method::GET), find(Method::PUT)) else {
            continue;
        };
        let Some(schema) = get.output.body_schema.clone() else {
            tracing::debug!(path = %path, "GET has no body; skipping PATCH generation");
            states.insert(path, PatchState::NoPatch);
            continue;
        };
        if put.input.body.is_none() {
            tracing::debug!(path = %path, "PUT takes no body; skipping PATCH generation");
            states.insert(path, PatchState::NoPatch);
            continue;
        }

        let operation = patch_operation(&get.operation, &path);
        let handler = generate(
            Arc::clone(api.registry()),
            schema,
            Arc::clone(&get.handler),
            Arc::clone(&put.handler),
        );
        let mut doc = OperationDoc::describe(&operation, &get.input, &put.output);
        doc.request_body = Some(patch_request_body());

        api.mount(
            RegisteredOperation {
                operation: operation.clone(),
                input: Arc::clone(&get.input),
                output: Arc::clone(&put.output),
                handler,
            },
            doc,
        )?;
        tracing::info!(operation = %operation.id, path = %path, "generated PATCH operation");
        states.insert(path, PatchState::PatchRegistered);
    }
    Ok(states)
}

fn patch_operation(get: &Operation, path: &str) -> Operation {
    let suffix = get.id.strip_prefix("get-").unwrap_or(&get.id);
    let mut op = Operation::patch(format!("patch-{suffix}"), path).description(
        "Partial update. Accepts JSON Merge Patch, shorthand merge patch or JSON Patch.",
    );
    if let Some(summary) = &get.summary {
        let rest = summary.strip_prefix("Get ").unwrap_or(summary);
        op = op.summary(format!("Patch {rest}"));
    }
    op.tags = get.tags.clone();
    op
}

fn patch_request_body() -> RequestBodyDoc {
    let object = || MediaTypeDoc {
        schema: Schema::of_type(SchemaType::Object),
    };
    let ops = Schema {
        items: Some(Box::new(Schema::of_type(SchemaType::Object))),
        ..Schema::of_type(SchemaType::Array)
    };
    RequestBodyDoc {
        required: true,
        content: BTreeMap::from([
            (MERGE_PATCH.to_string(), object()),
            (MERGE_SHORTHAND.to_string(), object()),
            (JSON_PATCH.to_string(), MediaTypeDoc { schema: ops }),
        ]),
    }
}

fn generate(registry: Arc<Registry>, schema: Schema, get: Handler, put: Handler) -> Handler {
    let schema = Arc::new(schema);
    handler_fn(move |req: Request| {
        let registry = Arc::clone(&registry);
        let schema = Arc::clone(&schema);
        let (get, put) = (Arc::clone(&get), Arc::clone(&put));
        async move {
            match run(&registry, &schema, get, put, req).await {
                Ok(response) => response,
                Err(err) => {
                    if !matches!(err, ApiError::NotModified) {
                        tracing::warn!(error = %err, "rejected patch");
                    }
                    Response::from(err)
                }
            }
        }
    })
}

async fn run(
    registry: &Registry,
    schema: &Schema,
    get: Handler,
    put: Handler,
    req: Request,
) -> Result<Response, ApiError> {
    let kind = PatchKind::from_content_type(req.content_type().as_deref())?;

    let mut get_req = Request::new(Method::GET, req.uri.clone());
    get_req.params = req.params.clone();
    get_req.headers = req.headers.clone();
    // Preconditions apply to the write, not to the read of the current state.
    for name in [
        CONTENT_TYPE,
        CONTENT_LENGTH,
        IF_MATCH,
        IF_NONE_MATCH,
        IF_MODIFIED_SINCE,
        IF_UNMODIFIED_SINCE,
    ] {
        get_req.headers.remove(name);
    }
    let current = get(get_req).await;
    if !current.is_success() {
        return Ok(current);
    }
    let current_value: Value = serde_json::from_slice(&current.body)
        .map_err(|e| ApiError::Internal(format!("GET returned a non-JSON body: {e}")))?;

    let candidate = patch::apply(kind, &current_value, &req.body)?;
    if json_eq(&candidate, &current_value) {
        return Err(ApiError::NotModified);
    }

    let result = validate(registry, schema, &candidate, ValidateMode::ReadFromServer, "body");
    if !result.is_empty() {
        return Err(ApiError::Validation(result.into_errors()));
    }

    let body = serde_json::to_vec(&candidate)
        .map_err(|e| ApiError::Internal(format!("cannot encode patched body: {e}")))?;
    let mut put_req = Request::new(Method::PUT, req.uri.clone()).with_body(body);
    put_req.params = req.params;
    put_req.headers = req.headers;
    put_req.headers.remove(CONTENT_LENGTH);
    put_req
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if !put_req.headers.contains_key(IF_MATCH) {
        if let Some(etag) = current.headers.get(ETAG) {
            put_req.headers.insert(IF_MATCH, etag.clone());
        }
    }
    if !put_req.headers.contains_key(IF_UNMODIFIED_SINCE) {
        if let Some(modified) = current.headers.get(LAST_MODIFIED) {
            put_req.headers.insert(IF_UNMODIFIED_SINCE, modified.clone());
        }
    }
    Ok(put(put_req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine() {
        assert_eq!(state_for(&[Method::GET]), PatchState::NoPatch);
        assert_eq!(state_for(&[Method::GET, Method::PUT]), PatchState::PatchNeeded);
        assert_eq!(
            state_for(&[Method::GET, Method::PUT, Method::PATCH]),
            PatchState::NoPatch
        );
    }

    #[test]
    fn generated_id_drops_get_prefix() {
        let get = Operation::get("get-thing", "/things/{id}").summary("Get thing").tag("things");
        let op = patch_operation(&get, "/things/{id}");
        assert_eq!(op.id, "patch-thing");
        assert_eq!(op.method, Method::PATCH);
        assert_eq!(op.summary.as_deref(), Some("Patch thing"));
        assert_eq!(op.tags, vec!["things"]);

        let op = patch_operation(&Operation::get("fetch", "/x"), "/x");
        assert_eq!(op.id, "patch-fetch");
    }
}
