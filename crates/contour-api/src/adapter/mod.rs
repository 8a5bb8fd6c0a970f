//! # Router Adapter Interface
//!
//! The capability an underlying HTTP router must provide: accept a route
//! for an operation and serve neutral [`Request`]s to its [`Handler`].
//! [`axum::AxumAdapter`] is the bundled implementation.

pub mod axum;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Request, Response};
use crate::error::SetupError;
use crate::operation::Operation;

/// Boxed response future.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased request handler. Validation, binding and rendering have
/// already been folded in; errors come back as error responses.
pub type Handler = Arc<dyn Fn(Request) -> ResponseFuture + Send + Sync>;

/// A router that can mount operations.
pub trait Adapter {
    /// Route `operation.method` + `operation.path` to `handler`.
    fn handle(&mut self, operation: &Operation, handler: Handler) -> Result<(), SetupError>;

    /// Upper bound on request bodies the router buffers. Routers that hand
    /// over complete bodies anyway can ignore it.
    fn set_body_limit(&mut self, _limit: usize) {}
}

/// Build a [`Handler`] from an async closure.
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}
