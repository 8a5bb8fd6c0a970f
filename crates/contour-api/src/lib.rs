//! # contour-api — Declarative HTTP Operations
//!
//! Registers typed operations on a router, binds and validates requests
//! against schemas derived by `contour-schema`, renders typed outputs and
//! serves the resulting OpenAPI 3.1 document.
//!
//! ## Components
//!
//! - [`context`] — router-neutral [`Request`] / [`Response`].
//! - [`adapter`] — the [`Adapter`] capability plus the axum implementation.
//! - [`binding`] — per-operation input plans; collects every parameter and
//!   body error into one 422.
//! - [`output`] — per-operation output plans (headers, status, body).
//! - [`api`] — [`Api`]: registration, duplicate detection, dispatch.
//! - [`openapi`] — the live OpenAPI document.
//! - [`conditional`] — `If-Match` / `If-None-Match` / date preconditions.
//! - [`patch`] / [`autopatch`] — patch strategies and the PATCH generator
//!   for GET+PUT resources.
//!
//! ## Crate Policy
//!
//! - Setup defects are [`SetupError`]s returned from registration; request
//!   defects are [`ApiError`]s rendered as `{"error": {...}}` bodies.
//! - Handlers never see unvalidated input.
//! - Internal error messages are logged, never returned to clients.

pub mod adapter;
pub mod api;
pub mod autopatch;
pub mod binding;
pub mod conditional;
pub mod config;
pub mod context;
pub mod error;
pub mod openapi;
pub mod operation;
pub mod output;
pub mod patch;

pub use adapter::axum::AxumAdapter;
pub use adapter::{handler_fn, Adapter, Handler};
pub use api::{Api, RegisteredOperation};
pub use autopatch::auto_patch;
pub use config::Config;
pub use context::{Request, Response};
pub use error::{ApiError, SetupError};
pub use openapi::OpenApi;
pub use operation::Operation;

use contour_schema::{Reflect, TypeDef};
use serde::{Deserialize, Serialize};

/// Input or output with no fields: no parameters, no body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

impl Reflect for Empty {
    fn reflect() -> TypeDef {
        TypeDef::object()
    }
}
