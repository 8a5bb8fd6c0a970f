//! # Schema Registry
//!
//! Process-wide cache from type identity to built [`Schema`]. Every named
//! object type is stored once under a short name derived from its Rust
//! type name. Two distinct types that derive (or are registered under) the
//! same name are a setup error.
//!
//! ## Modes
//!
//! - [`SchemaMode::Inline`] expands nested object types in place. A type
//!   that refers back to itself while it is being built gets a `$ref`
//!   instead, which is what keeps recursive types finite.
//! - [`SchemaMode::Reference`] makes every nested object a `$ref` into the
//!   registry's flat namespace.
//!
//! ## Concurrency
//!
//! Lookups of already built types take a shared read lock only. First-time
//! builds are serialized behind one build mutex, so no caller ever sees a
//! partially built node and no name is registered twice. The in-progress
//! set used for cycle breaking lives in a per-call [`BuildCtx`].

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::builder;
use crate::error::SetupError;
use crate::introspect::{Introspector, StructInfo};
use crate::reflect::{Reflect, Shape, TypeRef};
use crate::schema::Schema;

/// Default prefix for `$ref` pointers.
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// How nested object types are represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaMode {
    /// Expand nested objects in place.
    #[default]
    Inline,
    /// Point at nested objects with `$ref`.
    Reference,
}

/// Per-call build state: types currently being built, outermost first.
#[derive(Debug, Default)]
pub(crate) struct BuildCtx {
    in_progress: Vec<(TypeRef, String)>,
}

#[derive(Debug, Default)]
struct State {
    /// Built object schemas by name.
    schemas: BTreeMap<String, Arc<Schema>>,
    /// Which type owns each name.
    owners: HashMap<String, TypeRef>,
    /// Name assigned to each type.
    names: HashMap<TypeId, String>,
    /// Built object schemas by type.
    built: HashMap<TypeId, Arc<Schema>>,
}

/// Shared schema registry. Pass an `Arc<Registry>` to everything that needs
/// schemas; there is no global instance.
#[derive(Debug)]
pub struct Registry {
    mode: SchemaMode,
    prefix: String,
    introspector: Introspector,
    state: RwLock<State>,
    build_lock: Mutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(SchemaMode::default())
    }
}

impl Registry {
    /// Empty registry using [`COMPONENTS_PREFIX`] for references.
    pub fn new(mode: SchemaMode) -> Self {
        Self::with_prefix(mode, COMPONENTS_PREFIX)
    }

    /// Empty registry with a custom `$ref` prefix.
    pub fn with_prefix(mode: SchemaMode, prefix: impl Into<String>) -> Self {
        Self {
            mode,
            prefix: prefix.into(),
            introspector: Introspector::new(),
            state: RwLock::new(State::default()),
            build_lock: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> SchemaMode {
        self.mode
    }

    /// The registry's introspector, shared with the binding layer.
    pub fn introspector(&self) -> &Introspector {
        &self.introspector
    }

    /// Flattened field list of an object type.
    pub fn introspect(&self, ty: TypeRef) -> Result<Arc<StructInfo>, SetupError> {
        self.introspector.introspect(ty)
    }

    /// Schema to use wherever `T` appears.
    pub fn schema_of<T: Reflect>(&self) -> Result<Schema, SetupError> {
        self.schema_for(TypeRef::of::<T>())
    }

    /// Schema to use wherever `ty` appears. For object types this is a
    /// `$ref` in reference mode and the full expansion in inline mode.
    pub fn schema_for(&self, ty: TypeRef) -> Result<Schema, SetupError> {
        if let Some(hit) = self.cached_use_site(ty) {
            return Ok(hit);
        }
        let _guard = self.build_lock.lock();
        let mut ctx = BuildCtx::default();
        self.use_site(&mut ctx, ty)
    }

    /// Full (never `$ref`) schema of `ty`. Object types are built and
    /// registered if needed.
    pub fn definition(&self, ty: TypeRef) -> Result<Arc<Schema>, SetupError> {
        let (resolved, def) = ty.resolve();
        if !matches!(def.shape, Shape::Object(_)) {
            return self.schema_for(ty).map(Arc::new);
        }
        if let Some(hit) = self.state.read().built.get(&resolved.id()) {
            return Ok(Arc::clone(hit));
        }
        let _guard = self.build_lock.lock();
        let mut ctx = BuildCtx::default();
        let name = self.name_for(&ctx, resolved)?;
        self.build_object(&mut ctx, resolved, &name)
    }

    /// Register an object type under an explicit name and build it.
    ///
    /// Registering the same type under the same name again is a no-op.
    pub fn register(&self, ty: TypeRef, name: &str) -> Result<Arc<Schema>, SetupError> {
        let (resolved, def) = ty.resolve();
        if !matches!(def.shape, Shape::Object(_)) {
            return Err(SetupError::NotAnObject {
                type_name: resolved.type_name().to_string(),
            });
        }
        let _guard = self.build_lock.lock();
        {
            let mut state = self.state.write();
            if let Some(owner) = state.owners.get(name) {
                if owner.id() != resolved.id() {
                    return Err(collision(name, *owner, resolved));
                }
            }
            if let Some(existing) = state.built.get(&resolved.id()).cloned() {
                // Already built under its derived name; expose it under the
                // explicit name as well.
                state.owners.insert(name.to_string(), resolved);
                state.schemas.insert(name.to_string(), Arc::clone(&existing));
                return Ok(existing);
            }
            state.owners.insert(name.to_string(), resolved);
            state.names.insert(resolved.id(), name.to_string());
        }
        tracing::debug!(name, type_name = resolved.type_name(), "registered schema name");
        let mut ctx = BuildCtx::default();
        self.build_object(&mut ctx, resolved, name)
    }

    /// Look up a `$ref` pointer produced by this registry.
    pub fn resolve(&self, reference: &str) -> Option<Arc<Schema>> {
        let name = reference.strip_prefix(self.prefix.as_str())?;
        self.state.read().schemas.get(name).cloned()
    }

    /// Look up a named schema.
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.state.read().schemas.get(name).cloned()
    }

    /// Name assigned to a type, if it has been built or registered.
    pub fn name_of(&self, ty: TypeRef) -> Option<String> {
        self.state.read().names.get(&ty.resolve().0.id()).cloned()
    }

    /// Snapshot of every named schema, sorted by name.
    pub fn map(&self) -> BTreeMap<String, Arc<Schema>> {
        self.state.read().schemas.clone()
    }

    /// Number of named schemas.
    pub fn len(&self) -> usize {
        self.state.read().schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `$ref` pointer for a schema name.
    pub fn ref_path(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn cached_use_site(&self, ty: TypeRef) -> Option<Schema> {
        let (resolved, def) = ty.resolve();
        if !matches!(def.shape, Shape::Object(_)) {
            return None;
        }
        let state = self.state.read();
        let built = state.built.get(&resolved.id())?;
        match self.mode {
            SchemaMode::Inline => Some(built.as_ref().clone()),
            SchemaMode::Reference => {
                let name = state.names.get(&resolved.id())?;
                Some(Schema::reference(self.ref_path(name)))
            }
        }
    }

    /// Use-site schema for `ty`. Caller holds the build lock.
    pub(crate) fn use_site(&self, ctx: &mut BuildCtx, ty: TypeRef) -> Result<Schema, SetupError> {
        let (resolved, def) = ty.resolve();
        if !matches!(def.shape, Shape::Object(_)) {
            return builder::build_value(self, ctx, resolved, def);
        }
        let name = self.name_for(ctx, resolved)?;
        if ctx.in_progress.iter().any(|(t, _)| t.id() == resolved.id()) {
            return Ok(Schema::reference(self.ref_path(&name)));
        }
        let full = self.build_object(ctx, resolved, &name)?;
        Ok(match self.mode {
            SchemaMode::Inline => full.as_ref().clone(),
            SchemaMode::Reference => Schema::reference(self.ref_path(&name)),
        })
    }

    /// Build (or fetch) the full schema of an object type and store it
    /// under `name`. Caller holds the build lock.
    fn build_object(&self, ctx: &mut BuildCtx, ty: TypeRef, name: &str) -> Result<Arc<Schema>, SetupError> {
        if let Some(hit) = self.state.read().built.get(&ty.id()) {
            return Ok(Arc::clone(hit));
        }
        ctx.in_progress.push((ty, name.to_string()));
        let built = self
            .introspector
            .introspect(ty)
            .and_then(|info| builder::build_object(self, ctx, &info));
        ctx.in_progress.pop();
        let schema = Arc::new(built?);

        let mut state = self.state.write();
        if let Some(owner) = state.owners.get(name) {
            if owner.id() != ty.id() {
                return Err(collision(name, *owner, ty));
            }
        }
        state.owners.insert(name.to_string(), ty);
        state.names.insert(ty.id(), name.to_string());
        state.schemas.insert(name.to_string(), Arc::clone(&schema));
        state.built.insert(ty.id(), Arc::clone(&schema));
        tracing::debug!(name, type_name = ty.type_name(), "built schema");
        Ok(schema)
    }

    /// Name for an object type, checked against registered and in-progress
    /// names.
    fn name_for(&self, ctx: &BuildCtx, ty: TypeRef) -> Result<String, SetupError> {
        let state = self.state.read();
        if let Some(name) = state.names.get(&ty.id()) {
            return Ok(name.clone());
        }
        let name = short_name(ty.type_name());
        if let Some(owner) = state.owners.get(&name) {
            if owner.id() != ty.id() {
                return Err(collision(&name, *owner, ty));
            }
        }
        drop(state);
        if let Some((owner, _)) = ctx.in_progress.iter().find(|(t, n)| *n == name && t.id() != ty.id()) {
            return Err(collision(&name, *owner, ty));
        }
        Ok(name)
    }
}

fn collision(name: &str, existing: TypeRef, incoming: TypeRef) -> SetupError {
    SetupError::NameCollision {
        name: name.to_string(),
        existing: existing.type_name().to_string(),
        incoming: incoming.type_name().to_string(),
    }
}

/// Derive a schema name from a Rust type name: the last path segment, with
/// generic arguments appended (`app::Page<app::Item>` becomes `PageItem`).
pub fn short_name(type_name: &str) -> String {
    let (base, args) = match type_name.find('<') {
        Some(open) => {
            let close = type_name.rfind('>').unwrap_or(type_name.len());
            (&type_name[..open], &type_name[open + 1..close.max(open + 1)])
        }
        None => (type_name, ""),
    };
    let mut name: String = base
        .rsplit("::")
        .next()
        .unwrap_or(base)
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    for arg in split_generic_args(args) {
        let part = short_name(arg.trim());
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

fn split_generic_args(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < args.len() {
        out.push(&args[start..]);
    }
    out
}
