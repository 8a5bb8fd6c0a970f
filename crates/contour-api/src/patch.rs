//! # Patch Strategies
//!
//! The three patch formats a generated PATCH operation accepts, selected by
//! the request `Content-Type`:
//!
//! | Content-Type                         | Strategy                  |
//! |--------------------------------------|---------------------------|
//! | `application/merge-patch+json`       | RFC 7396 merge patch      |
//! | `application/json` or absent         | RFC 7396 merge patch      |
//! | `application/merge-shorthand+json`   | path-keyed shorthand      |
//! | `application/json-patch+json`        | RFC 6902 operation list   |
//!
//! Shorthand patches are JSON objects whose keys address a location with
//! dots and brackets (`items[0].name`). Each value replaces the addressed
//! location, creating intermediate objects; `null` removes it.

use serde_json::{Map, Value};

use crate::error::ApiError;

pub const MERGE_PATCH: &str = "application/merge-patch+json";
pub const MERGE_SHORTHAND: &str = "application/merge-shorthand+json";
pub const JSON_PATCH: &str = "application/json-patch+json";

/// Patch format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Merge,
    Shorthand,
    JsonPatch,
}

impl PatchKind {
    /// Select the strategy for a (lowercased, parameter-free) media type.
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, ApiError> {
        match content_type {
            None | Some("") | Some("application/json") | Some(MERGE_PATCH) => Ok(Self::Merge),
            Some(MERGE_SHORTHAND) => Ok(Self::Shorthand),
            Some(JSON_PATCH) => Ok(Self::JsonPatch),
            Some(other) => Err(ApiError::UnsupportedMediaType(other.to_string())),
        }
    }
}

/// Apply the patch in `body` to `current`, returning the candidate.
pub fn apply(kind: PatchKind, current: &Value, body: &[u8]) -> Result<Value, ApiError> {
    let patch: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid patch body: {e}")))?;
    let mut doc = current.clone();
    match kind {
        PatchKind::Merge => json_patch::merge(&mut doc, &patch),
        PatchKind::Shorthand => {
            let Value::Object(entries) = patch else {
                return Err(ApiError::BadRequest("shorthand patch must be a JSON object".into()));
            };
            apply_shorthand(&mut doc, entries)?;
        }
        PatchKind::JsonPatch => {
            if !patch.is_array() {
                return Err(ApiError::BadRequest("JSON Patch must be an array of operations".into()));
            }
            let ops: json_patch::Patch = serde_json::from_value(patch)
                .map_err(|e| ApiError::BadRequest(format!("invalid JSON Patch format: {e}")))?;
            json_patch::patch(&mut doc, &ops).map_err(|e| ApiError::invalid(e.to_string(), "body"))?;
        }
    }
    Ok(doc)
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>, ApiError> {
    let bad = || ApiError::BadRequest(format!("invalid shorthand path '{path}'"));
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, mut rest) = match part.find('[') {
            Some(i) => part.split_at(i),
            None => (part, ""),
        };
        if name.is_empty() && (segments.is_empty() || rest.is_empty()) {
            return Err(bad());
        }
        if !name.is_empty() {
            segments.push(Segment::Key(name.to_string()));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(bad)?;
            let index = rest[1..close].parse::<usize>().map_err(|_| bad())?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(bad());
            }
        }
    }
    Ok(segments)
}

fn apply_shorthand(doc: &mut Value, entries: Map<String, Value>) -> Result<(), ApiError> {
    for (key, value) in entries {
        let segments = parse_path(&key)?;
        let location = format!("body.{key}");
        let result = if value.is_null() {
            remove_at(doc, &segments)
        } else {
            set_at(doc, &segments, value)
        };
        result.map_err(|message| ApiError::invalid(message, location))?;
    }
    Ok(())
}

fn set_at(doc: &mut Value, segments: &[Segment], value: Value) -> Result<(), String> {
    let Some((first, rest)) = segments.split_first() else {
        *doc = value;
        return Ok(());
    };
    match first {
        Segment::Key(key) => {
            if !doc.is_object() {
                *doc = Value::Object(Map::new());
            }
            let Value::Object(map) = doc else {
                return Err("expected object".into());
            };
            let slot = map.entry(key.clone()).or_insert(Value::Null);
            set_at(slot, rest, value)
        }
        Segment::Index(i) => {
            let Value::Array(items) = doc else {
                return Err("expected array".into());
            };
            if *i == items.len() {
                items.push(Value::Null);
            }
            match items.get_mut(*i) {
                Some(slot) => set_at(slot, rest, value),
                None => Err(format!("index {i} out of bounds")),
            }
        }
    }
}

fn remove_at(doc: &mut Value, segments: &[Segment]) -> Result<(), String> {
    let Some((last, parents)) = segments.split_last() else {
        *doc = Value::Null;
        return Ok(());
    };
    let mut target = doc;
    for segment in parents {
        let next = match (segment, target) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(key),
            (Segment::Index(i), Value::Array(items)) => items.get_mut(*i),
            _ => None,
        };
        match next {
            Some(v) => target = v,
            // Removing something that is not there is a no-op.
            None => return Ok(()),
        }
    }
    match (last, target) {
        (Segment::Key(key), Value::Object(map)) => {
            map.remove(key);
        }
        (Segment::Index(i), Value::Array(items)) if *i < items.len() => {
            items.remove(*i);
        }
        _ => {}
    }
    Ok(())
}
