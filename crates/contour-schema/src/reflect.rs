//! # Reflection Model
//!
//! Rust has no runtime reflection, so types describe themselves through
//! the [`Reflect`] trait. A [`TypeDef`] is a plain description of a type's
//! shape; object fields point at their types through [`TypeRef`], which
//! holds a function pointer instead of an expanded definition. That keeps
//! recursive type graphs finite: nothing is expanded until the
//! introspector asks for it.
//!
//! ```ignore
//! impl Reflect for Thing {
//!     fn reflect() -> TypeDef {
//!         TypeDef::object()
//!             .doc("A thing.")
//!             .field::<String>("id", &[("format", "uuid")])
//!             .field::<Vec<Thing>>("children", &[("omitempty", "")])
//!     }
//! }
//! ```

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::DeserializeOwned;

use crate::resolve::{Resolve, Resolver};

/// A type that can describe its own shape.
pub trait Reflect: 'static {
    /// Describe this type. Called lazily and at most once per registry.
    fn reflect() -> TypeDef;
}

/// Handle to a reflected type: identity plus a lazy definition.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    type_name: &'static str,
    def: fn() -> TypeDef,
}

impl TypeRef {
    /// Handle for `T`.
    pub fn of<T: Reflect>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            def: T::reflect,
        }
    }

    /// Runtime identity of the type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Expand the type definition.
    pub fn def(&self) -> TypeDef {
        (self.def)()
    }

    /// Follow [`Shape::Alias`] links to the underlying type.
    pub fn resolve(&self) -> (TypeRef, TypeDef) {
        let mut ty = *self;
        loop {
            let def = ty.def();
            match def.shape {
                Shape::Alias(inner) => ty = inner,
                _ => return (ty, def),
            }
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

/// Shape of a reflected type.
#[derive(Debug, Clone)]
pub enum Shape {
    Bool,
    Integer { bits: u8, signed: bool },
    Number { bits: u8 },
    String,
    DateTime,
    Date,
    Uuid,
    /// Any JSON value.
    Any,
    /// `Option<T>`: may be absent or null.
    Optional(TypeRef),
    Array(TypeRef),
    /// String-keyed map with values of the given type.
    Map(TypeRef),
    Object(Vec<FieldDef>),
    /// Same schema as another type (`Box<T>`).
    Alias(TypeRef),
}

impl Shape {
    /// Short human name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Bool => "boolean",
            Shape::Integer { .. } => "integer",
            Shape::Number { .. } => "number",
            Shape::String | Shape::DateTime | Shape::Date | Shape::Uuid => "string",
            Shape::Any => "any",
            Shape::Optional(_) => "optional",
            Shape::Array(_) => "array",
            Shape::Map(_) => "map",
            Shape::Object(_) => "object",
            Shape::Alias(inner) => inner.def().shape.kind_name(),
        }
    }

    /// True for shapes that hold a single JSON scalar.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Shape::Bool
                | Shape::Integer { .. }
                | Shape::Number { .. }
                | Shape::String
                | Shape::DateTime
                | Shape::Date
                | Shape::Uuid
        )
    }
}

/// One declared object field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name as serde sees it.
    pub name: &'static str,
    pub ty: TypeRef,
    /// Raw `(key, literal)` annotations, parsed by the introspector.
    pub annotations: &'static [(&'static str, &'static str)],
    /// Promote this field's fields into the parent object.
    pub embedded: bool,
}

/// Description of a type.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub shape: Shape,
    pub doc: Option<&'static str>,
    /// Reject properties that are not declared (`additionalProperties: false`).
    pub deny_unknown_fields: bool,
    /// Extra checks run after schema validation passes.
    pub resolver: Option<Resolver>,
}

impl TypeDef {
    /// Definition with the given shape and no documentation.
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            doc: None,
            deny_unknown_fields: false,
            resolver: None,
        }
    }

    /// Start an object definition with no fields.
    pub fn object() -> Self {
        Self::new(Shape::Object(Vec::new()))
    }

    /// Attach a description.
    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = Some(doc);
        self
    }

    /// Mirror `#[serde(deny_unknown_fields)]` in the schema.
    pub fn deny_unknown_fields(mut self) -> Self {
        self.deny_unknown_fields = true;
        self
    }

    /// Run `T`'s [`Resolve`] checks on values of this type once they
    /// pass schema validation.
    pub fn resolver<T: Resolve + DeserializeOwned + 'static>(mut self) -> Self {
        self.resolver = Some(Resolver::of::<T>());
        self
    }

    /// Append a field of type `T`.
    ///
    /// Has no effect on non-object definitions.
    pub fn field<T: Reflect>(
        self,
        name: &'static str,
        annotations: &'static [(&'static str, &'static str)],
    ) -> Self {
        self.push(FieldDef {
            name,
            ty: TypeRef::of::<T>(),
            annotations,
            embedded: false,
        })
    }

    /// Embed `T`, promoting its fields into this object.
    pub fn embed<T: Reflect>(self) -> Self {
        self.push(FieldDef {
            name: "",
            ty: TypeRef::of::<T>(),
            annotations: &[],
            embedded: true,
        })
    }

    fn push(mut self, field: FieldDef) -> Self {
        if let Shape::Object(fields) = &mut self.shape {
            fields.push(field);
        }
        self
    }
}

// -- Built-in implementations ---------------------------------------------

macro_rules! reflect_scalar {
    ($($ty:ty => $shape:expr),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn reflect() -> TypeDef {
                    TypeDef::new($shape)
                }
            }
        )*
    };
}

reflect_scalar! {
    bool => Shape::Bool,
    i8 => Shape::Integer { bits: 8, signed: true },
    i16 => Shape::Integer { bits: 16, signed: true },
    i32 => Shape::Integer { bits: 32, signed: true },
    i64 => Shape::Integer { bits: 64, signed: true },
    isize => Shape::Integer { bits: 64, signed: true },
    u8 => Shape::Integer { bits: 8, signed: false },
    u16 => Shape::Integer { bits: 16, signed: false },
    u32 => Shape::Integer { bits: 32, signed: false },
    u64 => Shape::Integer { bits: 64, signed: false },
    usize => Shape::Integer { bits: 64, signed: false },
    f32 => Shape::Number { bits: 32 },
    f64 => Shape::Number { bits: 64 },
    String => Shape::String,
    chrono::DateTime<chrono::Utc> => Shape::DateTime,
    chrono::NaiveDate => Shape::Date,
    uuid::Uuid => Shape::Uuid,
    serde_json::Value => Shape::Any,
}

impl<T: Reflect> Reflect for Option<T> {
    fn reflect() -> TypeDef {
        TypeDef::new(Shape::Optional(TypeRef::of::<T>()))
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn reflect() -> TypeDef {
        TypeDef::new(Shape::Array(TypeRef::of::<T>()))
    }
}

impl<T: Reflect> Reflect for Box<T> {
    fn reflect() -> TypeDef {
        TypeDef::new(Shape::Alias(TypeRef::of::<T>()))
    }
}

impl<V: Reflect> Reflect for HashMap<String, V> {
    fn reflect() -> TypeDef {
        TypeDef::new(Shape::Map(TypeRef::of::<V>()))
    }
}

impl<V: Reflect> Reflect for BTreeMap<String, V> {
    fn reflect() -> TypeDef {
        TypeDef::new(Shape::Map(TypeRef::of::<V>()))
    }
}
