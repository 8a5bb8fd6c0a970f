//! # Type Introspector
//!
//! Turns an object [`TypeDef`] into a flattened, normalized field list.
//!
//! Embedded fields are followed depth-first and their fields promoted into
//! the parent. A field declared directly on the outer type shadows any
//! embedded field with the same visible name; among embedded types the
//! first declaration wins. Two direct fields with the same visible name are
//! a [`SetupError::DuplicateField`].
//!
//! Fields tagged `body` or `raw_body` are not properties of the type. They
//! are captured separately so the binding layer knows where the request
//! payload goes.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::annotation::{self, Annotation, FieldCtx, Location, Target};
use crate::error::SetupError;
use crate::reflect::{FieldDef, Shape, TypeDef, TypeRef};

/// One normalized field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name as serde sees it.
    pub name: &'static str,
    /// JSON property name.
    pub json_name: String,
    pub ty: TypeRef,
    /// Coarse kind used for literal coercion.
    pub target: Target,
    /// Parsed annotations in declaration order.
    pub annotations: Vec<Annotation>,
    pub required: bool,
    /// Source location for input fields, destination for output fields.
    pub location: Option<Location>,
}

impl FieldDescriptor {
    /// The declared default, if any.
    pub fn default_value(&self) -> Option<&Value> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Default(v) => Some(v),
            _ => None,
        })
    }

    /// True if the field's type is `Option<T>`.
    pub fn is_optional(&self) -> bool {
        matches!(self.ty.resolve().1.shape, Shape::Optional(_))
    }
}

/// Flattened view of one object type.
#[derive(Debug, Clone)]
pub struct StructInfo {
    pub type_name: &'static str,
    pub doc: Option<&'static str>,
    pub deny_unknown_fields: bool,
    /// Schema-visible fields, flattened, in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// The field carrying the JSON body.
    pub body: Option<FieldDescriptor>,
    /// The field receiving raw body bytes.
    pub raw_body: Option<FieldDescriptor>,
}

impl StructInfo {
    /// Look up a field by JSON name.
    pub fn field(&self, json_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.json_name == json_name)
    }

    /// Fields bound to a request or response location other than the body.
    pub fn located(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.location.is_some())
    }
}

/// Memoizing introspector. One per [`Registry`](crate::registry::Registry).
#[derive(Debug, Default)]
pub struct Introspector {
    cache: RwLock<HashMap<TypeId, Arc<StructInfo>>>,
}

impl Introspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe an object type. Results are cached per type.
    pub fn introspect(&self, ty: TypeRef) -> Result<Arc<StructInfo>, SetupError> {
        let (ty, _) = ty.resolve();
        if let Some(hit) = self.cache.read().get(&ty.id()) {
            return Ok(Arc::clone(hit));
        }
        let info = Arc::new(self.describe(ty, &mut Vec::new())?);
        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(ty.id()).or_insert(info)))
    }

    fn describe(&self, ty: TypeRef, embed_stack: &mut Vec<TypeId>) -> Result<StructInfo, SetupError> {
        let (ty, def) = ty.resolve();
        let TypeDef {
            shape,
            doc,
            deny_unknown_fields,
            resolver: _,
        } = def;
        let Shape::Object(declared) = shape else {
            return Err(SetupError::NotAnObject {
                type_name: ty.type_name().to_string(),
            });
        };
        let type_name = ty.type_name();

        // One slot per declared non-embedded field; hidden fields are `None`.
        let mut direct = Vec::new();
        for field in declared.iter().filter(|f| !f.embedded) {
            direct.push(describe_field(type_name, field)?);
        }

        let mut seen = HashSet::new();
        for desc in direct.iter().flatten().filter(|d| !is_payload(d)) {
            if !seen.insert(desc.json_name.clone()) {
                return Err(SetupError::DuplicateField {
                    type_name: type_name.to_string(),
                    field: desc.json_name.clone(),
                });
            }
        }

        let mut info = StructInfo {
            type_name,
            doc,
            deny_unknown_fields,
            fields: Vec::new(),
            body: None,
            raw_body: None,
        };

        // Walk declaration order again so promoted fields land where the
        // embed was declared.
        let mut direct = direct.into_iter();
        embed_stack.push(ty.id());
        let result = (|| -> Result<(), SetupError> {
            for field in &declared {
                if !field.embedded {
                    if let Some(Some(desc)) = direct.next() {
                        place(&mut info, desc);
                    }
                    continue;
                }
                let (embedded, embedded_def) = field.ty.resolve();
                if !matches!(embedded_def.shape, Shape::Object(_)) || embed_stack.contains(&embedded.id()) {
                    return Err(SetupError::InvalidEmbed {
                        type_name: type_name.to_string(),
                        embedded: embedded.type_name().to_string(),
                    });
                }
                let inner = self.describe(embedded, embed_stack)?;
                for promoted in inner.fields {
                    if seen.insert(promoted.json_name.clone()) {
                        info.fields.push(promoted);
                    }
                }
                if info.body.is_none() {
                    info.body = inner.body;
                }
                if info.raw_body.is_none() {
                    info.raw_body = inner.raw_body;
                }
            }
            Ok(())
        })();
        embed_stack.pop();
        result?;
        Ok(info)
    }
}

fn is_payload(desc: &FieldDescriptor) -> bool {
    matches!(desc.location, Some(Location::Body | Location::RawBody))
}

fn place(info: &mut StructInfo, desc: FieldDescriptor) {
    match desc.location {
        Some(Location::Body) => info.body = Some(desc),
        Some(Location::RawBody) => info.raw_body = Some(desc),
        _ => info.fields.push(desc),
    }
}

/// Parse one declared field. `None` if the field is hidden.
fn describe_field(type_name: &str, field: &FieldDef) -> Result<Option<FieldDescriptor>, SetupError> {
    let ctx = FieldCtx {
        type_name,
        field: field.name,
    };
    let target = Target::of(&field.ty);
    let mut annotations = Vec::with_capacity(field.annotations.len());
    for (key, literal) in field.annotations {
        annotations.push(annotation::parse(&ctx, key, literal, &target)?);
    }

    let mut json_name = field.name.to_string();
    let mut omit_empty = false;
    let mut explicit_required = None;
    let mut has_default = false;
    let mut location = None;
    for a in &annotations {
        match a {
            Annotation::Rename(name) if name == "-" => return Ok(None),
            Annotation::Rename(name) => json_name = name.clone(),
            Annotation::Hidden(true) => return Ok(None),
            Annotation::OmitEmpty(flag) => omit_empty = *flag,
            Annotation::Required(flag) => explicit_required = Some(*flag),
            Annotation::Default(_) => has_default = true,
            Annotation::Location(loc) => location = Some(loc.clone()),
            _ => {}
        }
    }

    let optional_kind = matches!(field.ty.resolve().1.shape, Shape::Optional(_));
    let implied = match location {
        Some(Location::Path(_)) => true,
        Some(Location::Query(_) | Location::Header(_) | Location::Cookie(_)) => false,
        _ => !omit_empty && !has_default && !optional_kind,
    };

    Ok(Some(FieldDescriptor {
        name: field.name,
        json_name,
        ty: field.ty,
        target,
        annotations,
        required: explicit_required.unwrap_or(implied),
        location,
    }))
}
