//! # Setup Errors
//!
//! Configuration defects found while introspecting types or building
//! schemas. Every variant is fatal: callers surface it at startup, before
//! any request is served, and never retry.

use thiserror::Error;

/// Error raised while turning a type declaration into a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Two distinct types derived (or were registered under) the same name.
    #[error("schema name collision: '{name}' is used by both {existing} and {incoming}")]
    NameCollision {
        /// The contested schema name.
        name: String,
        /// Fully qualified name of the type already holding `name`.
        existing: String,
        /// Fully qualified name of the type that tried to take `name`.
        incoming: String,
    },

    /// A field carries an annotation key outside the recognized vocabulary.
    #[error("unknown annotation '{key}' on {type_name}.{field}")]
    UnknownAnnotation {
        /// Type declaring the field.
        type_name: String,
        /// Field name as declared.
        field: String,
        /// The unrecognized key.
        key: String,
    },

    /// An annotation literal could not be parsed into its target type, or
    /// the annotation does not apply to the field's kind.
    #[error("invalid annotation {key}=\"{literal}\" on {type_name}.{field}: {reason}")]
    InvalidAnnotation {
        /// Type declaring the field.
        type_name: String,
        /// Field name as declared.
        field: String,
        /// Annotation key.
        key: String,
        /// Raw literal as written.
        literal: String,
        /// Why the literal was rejected.
        reason: String,
    },

    /// Two fields of one flattened object resolve to the same visible name.
    #[error("duplicate field '{field}' in {type_name}")]
    DuplicateField {
        /// Type declaring the fields.
        type_name: String,
        /// The repeated visible name.
        field: String,
    },

    /// An embedded field does not refer to an object type.
    #[error("cannot embed non-object type {embedded} into {type_name}")]
    InvalidEmbed {
        /// Type declaring the embed.
        type_name: String,
        /// Type that was embedded.
        embedded: String,
    },

    /// Explicit registration requested for a type that is not an object.
    #[error("only object types can be registered by name, got {type_name}")]
    NotAnObject {
        /// The offending type.
        type_name: String,
    },
}

impl SetupError {
    /// Build an [`SetupError::InvalidAnnotation`] with the common context.
    pub(crate) fn invalid(
        type_name: &str,
        field: &str,
        key: &str,
        literal: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAnnotation {
            type_name: type_name.to_string(),
            field: field.to_string(),
            key: key.to_string(),
            literal: literal.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_collision_display_names_both_types() {
        let err = SetupError::NameCollision {
            name: "Thing".into(),
            existing: "a::Thing".into(),
            incoming: "b::Thing".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("a::Thing"));
        assert!(msg.contains("b::Thing"));
    }

    #[test]
    fn invalid_annotation_display() {
        let err = SetupError::invalid("Greeting", "num", "minimum", "abc", "not a number");
        assert_eq!(
            err.to_string(),
            "invalid annotation minimum=\"abc\" on Greeting.num: not a number"
        );
    }
}
