//! # API Assembly
//!
//! [`Api`] ties configuration, the schema registry, the router adapter and
//! the OpenAPI document together. Registering an operation derives its
//! binding and rendering plans up front, so every annotation or schema
//! defect is reported before the first request is served.
//!
//! ## Request Pipeline
//!
//! ```text
//! Request → InputPlan::bind (params + body, all errors → 422)
//!         → serde_json::from_value::<I> → handler → OutputPlan::render
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use contour_schema::{Reflect, Registry, Schema, TypeRef};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::adapter::axum::AxumAdapter;
use crate::adapter::{handler_fn, Adapter, Handler};
use crate::binding::InputPlan;
use crate::config::Config;
use crate::context::{Request, Response};
use crate::error::{ApiError, SetupError};
use crate::openapi::{OpenApi, OperationDoc};
use crate::operation::Operation;
use crate::output::OutputPlan;

/// An operation mounted on the API.
#[derive(Clone)]
pub struct RegisteredOperation {
    pub operation: Operation,
    pub input: Arc<InputPlan>,
    pub output: Arc<OutputPlan>,
    /// Type-erased handler, including binding and rendering.
    pub handler: Handler,
}

impl std::fmt::Debug for RegisteredOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredOperation")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// A declarative API on top of a router adapter.
pub struct Api<A: Adapter> {
    config: Config,
    registry: Arc<Registry>,
    adapter: A,
    operations: Vec<RegisteredOperation>,
    openapi: Arc<RwLock<OpenApi>>,
    /// The document route, which takes part in duplicate checks.
    doc_route: Option<Operation>,
}

impl<A: Adapter> Api<A> {
    /// Create an API and mount the OpenAPI document route if configured.
    pub fn new(config: Config, mut adapter: A) -> Result<Self, SetupError> {
        let registry = Arc::new(Registry::with_prefix(
            config.schema_mode,
            config.components_prefix.clone(),
        ));
        adapter.set_body_limit(config.max_body_bytes);
        let openapi = Arc::new(RwLock::new(OpenApi::new(&config)));

        let doc_route = config
            .openapi_path
            .as_ref()
            .map(|path| Operation::get("openapi", path.clone()));
        if let Some(route) = &doc_route {
            let doc = Arc::clone(&openapi);
            let schemas = Arc::clone(&registry);
            let serve = handler_fn(move |_req: Request| {
                let body = doc.read().with_components(&schemas);
                async move { Response::json(StatusCode::OK, &body) }
            });
            adapter.handle(route, serve)?;
        }

        Ok(Self {
            config,
            registry,
            adapter,
            operations: Vec::new(),
            openapi,
            doc_route,
        })
    }

    /// Register a typed operation.
    ///
    /// `I` is bound from the request (path, query, header, cookie fields
    /// and the body); `O` is rendered into the response.
    pub fn register<I, O, F, Fut>(&mut self, operation: Operation, handler: F) -> Result<(), SetupError>
    where
        I: Reflect + DeserializeOwned + Send + 'static,
        O: Reflect + Serialize + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ApiError>> + Send + 'static,
    {
        operation.check()?;
        self.ensure_unique(&operation)?;

        let input = Arc::new(InputPlan::build(&self.registry, TypeRef::of::<I>(), &operation)?);
        let output = Arc::new(OutputPlan::build(&self.registry, TypeRef::of::<O>(), &operation)?);
        let doc = OperationDoc::describe(&operation, &input, &output);

        let registry = Arc::clone(&self.registry);
        let max_body_bytes = self.config.max_body_bytes;
        let handler = Arc::new(handler);
        let (bind_plan, render_plan) = (Arc::clone(&input), Arc::clone(&output));
        let erased = handler_fn(move |req: Request| {
            let registry = Arc::clone(&registry);
            let handler = Arc::clone(&handler);
            let bind_plan = Arc::clone(&bind_plan);
            let render_plan = Arc::clone(&render_plan);
            async move {
                let result: Result<Response, ApiError> = async {
                    let bound = bind_plan.bind(&registry, &req, max_body_bytes)?;
                    let input: I = serde_json::from_value(bound)
                        .map_err(|e| ApiError::BadRequest(format!("cannot decode input: {e}")))?;
                    let output = handler(input).await?;
                    let value = serde_json::to_value(&output)
                        .map_err(|e| ApiError::Internal(format!("cannot encode output: {e}")))?;
                    render_plan.render(value)
                }
                .await;
                result.unwrap_or_else(Response::from)
            }
        });

        self.mount(RegisteredOperation {
            operation,
            input,
            output,
            handler: erased,
        }, doc)
    }

    /// Mount an already type-erased operation.
    pub(crate) fn mount(&mut self, registered: RegisteredOperation, doc: OperationDoc) -> Result<(), SetupError> {
        self.ensure_unique(&registered.operation)?;
        self.adapter
            .handle(&registered.operation, Arc::clone(&registered.handler))?;
        self.openapi.write().add(&registered.operation, doc);
        tracing::debug!(
            operation = %registered.operation.id,
            method = %registered.operation.method,
            path = %registered.operation.path,
            "registered operation"
        );
        self.operations.push(registered);
        Ok(())
    }

    fn ensure_unique(&self, operation: &Operation) -> Result<(), SetupError> {
        let taken = self
            .operations
            .iter()
            .map(|r| &r.operation)
            .chain(self.doc_route.as_ref())
            .any(|existing| {
                existing.id == operation.id
                    || (existing.method == operation.method && existing.path == operation.path)
            });
        if taken {
            return Err(SetupError::DuplicateOperation(operation.id.clone()));
        }
        Ok(())
    }

    /// Register `T` under an explicit component name.
    pub fn register_schema<T: Reflect>(&self, name: &str) -> Result<Arc<Schema>, SetupError> {
        Ok(self.registry.register(TypeRef::of::<T>(), name)?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Registered operations in registration order.
    pub fn operations(&self) -> &[RegisteredOperation] {
        &self.operations
    }

    /// The operation mounted at `method` + `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<&RegisteredOperation> {
        self.operations
            .iter()
            .find(|r| r.operation.method == *method && r.operation.path == path)
    }

    /// Current OpenAPI document, components included.
    pub fn openapi(&self) -> OpenApi {
        self.openapi.read().with_components(&self.registry)
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }
}

impl Api<AxumAdapter> {
    /// Finished axum router.
    pub fn into_router(self) -> axum::Router {
        self.adapter.into_router()
    }
}
