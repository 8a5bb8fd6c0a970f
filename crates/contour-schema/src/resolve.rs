//! # Resolvers
//!
//! Checks that schema keywords cannot express, such as rules spanning
//! several fields. A type opts in by implementing [`Resolve`] and
//! attaching itself in its definition:
//!
//! ```ignore
//! impl Reflect for Window {
//!     fn reflect() -> TypeDef {
//!         TypeDef::object()
//!             .field::<u32>("start", &[])
//!             .field::<u32>("end", &[])
//!             .resolver::<Self>()
//!     }
//! }
//!
//! impl Resolve for Window {
//!     fn resolve(&self, path: &mut PathBuffer, result: &mut ValidateResult) {
//!         if self.end < self.start {
//!             path.push_field("end");
//!             result.add(path, "expected end >= start", None);
//!             path.pop();
//!         }
//!     }
//! }
//! ```
//!
//! A resolver only runs on a value that already passed schema validation,
//! so it may rely on every declared constraint holding. Its errors join
//! the same report as the schema errors.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::reflect::{Shape, TypeRef};
use crate::validate::{PathBuffer, ValidateResult};

/// Extra validation for a decoded value.
pub trait Resolve {
    /// Report problems with `self`. `path` holds the location of `self`
    /// (e.g. `body`); push segments onto it for nested locations.
    fn resolve(&self, path: &mut PathBuffer, result: &mut ValidateResult);
}

type ResolveFn = fn(&Value, &mut PathBuffer, &mut ValidateResult);

/// Type-erased [`Resolve`] implementation attached to a type definition.
#[derive(Clone, Copy)]
pub struct Resolver {
    type_name: &'static str,
    run: ResolveFn,
}

impl Resolver {
    /// Resolver that decodes the value as `T` and calls [`Resolve::resolve`].
    pub fn of<T: Resolve + DeserializeOwned + 'static>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            run: decode_and_resolve::<T>,
        }
    }

    /// Run against an already validated value.
    pub fn run(&self, value: &Value, path: &mut PathBuffer, result: &mut ValidateResult) {
        (self.run)(value, path, result)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolver({})", self.type_name)
    }
}

fn decode_and_resolve<T: Resolve + DeserializeOwned>(
    value: &Value,
    path: &mut PathBuffer,
    result: &mut ValidateResult,
) {
    match T::deserialize(value) {
        Ok(decoded) => decoded.resolve(path, result),
        // The schema and the serde model disagree; the handler's own
        // decode reports this.
        Err(e) => tracing::debug!(
            type_name = std::any::type_name::<T>(),
            error = %e,
            "skipping resolver for undecodable value"
        ),
    }
}

/// Resolver attached to `ty`, looking through `Option` and `Box`.
pub fn resolver_of(ty: TypeRef) -> Option<Resolver> {
    let (_, def) = ty.resolve();
    match def.shape {
        Shape::Optional(inner) => resolver_of(inner),
        _ => def.resolver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{Reflect, TypeDef};
    use serde_json::json;

    #[derive(Deserialize)]
    struct Window {
        start: u32,
        end: u32,
    }

    impl Reflect for Window {
        fn reflect() -> TypeDef {
            TypeDef::object()
                .field::<u32>("start", &[])
                .field::<u32>("end", &[])
                .resolver::<Self>()
        }
    }

    impl Resolve for Window {
        fn resolve(&self, path: &mut PathBuffer, result: &mut ValidateResult) {
            if self.end < self.start {
                path.push_field("end");
                result.add(path, "expected end >= start", None);
                path.pop();
            }
        }
    }

    #[test]
    fn resolver_reports_under_the_given_path() {
        let resolver = resolver_of(TypeRef::of::<Window>()).unwrap();
        let mut path = PathBuffer::new("body");
        let mut result = ValidateResult::default();
        resolver.run(&json!({"start": 5, "end": 2}), &mut path, &mut result);
        assert_eq!(result.locations(), vec!["body.end"]);
        assert_eq!(path.as_str(), "body");

        let mut result = ValidateResult::default();
        resolver.run(&json!({"start": 1, "end": 2}), &mut path, &mut result);
        assert!(result.is_empty());
    }

    #[test]
    fn resolver_is_found_through_option_and_box() {
        assert!(resolver_of(TypeRef::of::<Option<Window>>()).is_some());
        assert!(resolver_of(TypeRef::of::<Box<Window>>()).is_some());
        assert!(resolver_of(TypeRef::of::<Vec<Window>>()).is_none());
        assert!(resolver_of(TypeRef::of::<String>()).is_none());
    }

    #[test]
    fn undecodable_value_is_skipped() {
        let resolver = resolver_of(TypeRef::of::<Window>()).unwrap();
        let mut result = ValidateResult::default();
        resolver.run(&json!({"start": "x"}), &mut PathBuffer::new("body"), &mut result);
        assert!(result.is_empty());
    }
}
