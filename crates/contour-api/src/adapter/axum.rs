//! # Axum Adapter
//!
//! Mounts operations on an [`axum::Router`]. Each route reads the body into
//! memory (bounded by the configured limit), captures path parameters, and
//! hands a neutral [`Request`] to the operation's [`Handler`].
//!
//! ## Middleware Stack
//!
//! ```text
//! TraceLayer → CatchPanicLayer → Handler
//! ```
//!
//! A panicking handler becomes a plain 500 with no diagnostic detail.

use std::collections::HashMap;

use ::axum::body::{to_bytes, Body};
use ::axum::extract::{Path, Request as AxumRequest};
use ::axum::response::{IntoResponse, Response as AxumResponse};
use ::axum::routing::{on, MethodFilter};
use ::axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use super::{Adapter, Handler};
use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::context::{Request, Response};
use crate::error::{ApiError, SetupError};
use crate::operation::Operation;

/// [`Adapter`] backed by an axum [`Router`].
#[derive(Debug)]
pub struct AxumAdapter {
    router: Router,
    body_limit: usize,
}

impl Default for AxumAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AxumAdapter {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            body_limit: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Start from an existing router, e.g. one carrying health probes.
    pub fn with_router(router: Router) -> Self {
        Self {
            router,
            body_limit: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// The finished router with tracing and panic recovery applied.
    pub fn into_router(self) -> Router {
        self.router
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http())
    }
}

impl Adapter for AxumAdapter {
    fn handle(&mut self, operation: &Operation, handler: Handler) -> Result<(), SetupError> {
        let filter = MethodFilter::try_from(operation.method.clone()).map_err(|_| {
            SetupError::UnsupportedMethod {
                operation: operation.id.clone(),
                method: operation.method.to_string(),
            }
        })?;
        let limit = self.body_limit;

        let route = if operation.path.contains('{') {
            on(
                filter,
                move |Path(params): Path<HashMap<String, String>>, req: AxumRequest| {
                    let handler = handler.clone();
                    async move { dispatch(handler, params, req, limit).await }
                },
            )
        } else {
            on(filter, move |req: AxumRequest| {
                let handler = handler.clone();
                async move { dispatch(handler, HashMap::new(), req, limit).await }
            })
        };

        let router = std::mem::take(&mut self.router);
        self.router = router.route(&operation.path, route);
        tracing::debug!(method = %operation.method, path = %operation.path, "mounted route");
        Ok(())
    }

    fn set_body_limit(&mut self, limit: usize) {
        self.body_limit = limit;
    }
}

async fn dispatch(
    handler: Handler,
    params: HashMap<String, String>,
    req: AxumRequest,
    limit: usize,
) -> AxumResponse {
    let (parts, body) = req.into_parts();
    // One byte over the limit is enough for the binding layer to reject it.
    let body = match to_bytes(body, limit.saturating_add(1)).await {
        Ok(bytes) => bytes,
        Err(_) => return ApiError::PayloadTooLarge { limit }.into_response(),
    };
    let request = Request {
        method: parts.method,
        uri: parts.uri,
        params,
        headers: parts.headers,
        body,
    };
    handler(request).await.into_response()
}

impl IntoResponse for Response {
    fn into_response(self) -> AxumResponse {
        let mut out = AxumResponse::new(Body::from(self.body));
        *out.status_mut() = self.status;
        *out.headers_mut() = self.headers;
        out
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> AxumResponse {
        Response::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::handler_fn;
    use ::axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn echo() -> Handler {
        handler_fn(|req: Request| async move {
            let body = serde_json::json!({
                "method": req.method.as_str(),
                "id": req.param("id"),
                "len": req.body.len(),
            });
            Response::json(StatusCode::OK, &body)
        })
    }

    #[tokio::test]
    async fn routes_with_and_without_params() {
        let mut adapter = AxumAdapter::new();
        adapter
            .handle(&Operation::get("get-thing", "/things/{id}"), echo())
            .unwrap();
        adapter
            .handle(&Operation::put("put-thing", "/things/{id}"), echo())
            .unwrap();
        adapter.handle(&Operation::get("list", "/things"), echo()).unwrap();
        let app = adapter.into_router();

        let res = app
            .clone()
            .oneshot(
                ::axum::http::Request::builder()
                    .method(Method::PUT)
                    .uri("/things/a%20b")
                    .body(Body::from("xyz"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["id"], "a b");
        assert_eq!(v["len"], 3);

        let res = app
            .oneshot(
                ::axum::http::Request::builder()
                    .uri("/things")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut adapter = AxumAdapter::new();
        adapter.set_body_limit(4);
        adapter.handle(&Operation::post("post", "/p"), echo()).unwrap();
        let res = adapter
            .into_router()
            .oneshot(
                ::axum::http::Request::builder()
                    .method(Method::POST)
                    .uri("/p")
                    .body(Body::from("0123456789"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    #[allow(unreachable_code)]
    async fn panics_become_500() {
        let mut adapter = AxumAdapter::new();
        let boom = handler_fn(|_req: Request| async move {
            panic!("handler exploded");
            Response::new(StatusCode::OK)
        });
        adapter.handle(&Operation::get("boom", "/boom"), boom).unwrap();
        let res = adapter
            .into_router()
            .oneshot(
                ::axum::http::Request::builder()
                    .uri("/boom")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
