//! # API Configuration
//!
//! Settings fixed when an [`Api`](crate::Api) is created. The schema mode in
//! particular is API-wide: it cannot vary per type or per request.

use contour_schema::{SchemaMode, COMPONENTS_PREFIX};

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// API-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Document title for `info.title`.
    pub title: String,
    /// API version for `info.version`.
    pub version: String,
    /// Inline nested schemas or reference them through `$ref`.
    pub schema_mode: SchemaMode,
    /// Prefix of `$ref` pointers into the components section.
    pub components_prefix: String,
    /// Serve the OpenAPI document at this path, if set.
    pub openapi_path: Option<String>,
    /// Requests with larger bodies are rejected with 413.
    pub max_body_bytes: usize,
}

impl Config {
    /// Default configuration with the given title and version.
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            schema_mode: SchemaMode::Inline,
            components_prefix: COMPONENTS_PREFIX.to_string(),
            openapi_path: Some("/openapi.json".to_string()),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keeps_defaults() {
        let config = Config::new("Demo", "0.1.0");
        assert_eq!(config.title, "Demo");
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.openapi_path.as_deref(), Some("/openapi.json"));
    }
}
