//! # contour-schema — Schema Derivation & Validation
//!
//! Derives JSON Schema from Rust types and validates decoded JSON values
//! against it. This is the core the HTTP layer (`contour-api`) builds on.
//!
//! ## Pipeline
//!
//! - [`reflect`] — the [`Reflect`] trait: types describe their own shape,
//!   fields and `(key, literal)` annotations.
//! - [`annotation`] — parses annotation literals into typed constraints.
//! - [`introspect`] — flattens embedded fields, applies shadowing and
//!   captures body/location metadata. Cached per type.
//! - [`builder`] — maps one type to one [`Schema`] node.
//! - [`registry`] — process-wide named schema cache with inline and
//!   by-reference modes, cycle breaking and collision detection.
//! - [`validate`] — accumulating validator producing path-qualified
//!   [`ErrorDetail`]s.
//! - [`defaults`] — fills declared defaults into validated values.
//! - [`resolve`] — [`Resolve`] hooks for checks beyond the schema,
//!   reported alongside schema errors.
//!
//! ## Crate Policy
//!
//! - No HTTP types. Transport concerns live in `contour-api`.
//! - Every configuration defect is a [`SetupError`] raised at setup, before
//!   any request is served.
//! - Validation never stops at the first failure. Tests assert on error
//!   counts and locations, not just pass/fail.

pub mod annotation;
pub mod builder;
pub mod defaults;
pub mod error;
pub mod format;
pub mod introspect;
pub mod reflect;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod validate;

pub use annotation::{Annotation, Location, Target};
pub use builder::field_schema;
pub use error::SetupError;
pub use introspect::{FieldDescriptor, StructInfo};
pub use reflect::{FieldDef, Reflect, Shape, TypeDef, TypeRef};
pub use registry::{Registry, SchemaMode, COMPONENTS_PREFIX};
pub use resolve::{resolver_of, Resolve, Resolver};
pub use schema::{AdditionalProperties, Pattern, Properties, Schema, SchemaType, TypeSet};
pub use validate::{validate, ErrorDetail, PathBuffer, ValidateMode, ValidateResult};
