//! # Operations
//!
//! An [`Operation`] is one method + path pair with its documentation. The
//! handler and the input/output types are attached at registration time.

use axum::http::Method;

use crate::error::SetupError;

/// One API operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Unique operation id, e.g. `get-greeting`.
    pub id: String,
    pub method: Method,
    /// Route template with `{name}` path parameters.
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Status for successful responses when the output sets none.
    pub default_status: Option<u16>,
}

impl Operation {
    pub fn new(method: Method, id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method,
            path: path.into(),
            summary: None,
            description: None,
            tags: Vec::new(),
            default_status: None,
        }
    }

    pub fn get(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::GET, id, path)
    }

    pub fn post(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::POST, id, path)
    }

    pub fn put(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::PUT, id, path)
    }

    pub fn patch(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, id, path)
    }

    pub fn delete(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, id, path)
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn default_status(mut self, status: u16) -> Self {
        self.default_status = Some(status);
        self
    }

    /// Names of the `{param}` segments in the path template.
    pub fn path_params(&self) -> Vec<&str> {
        self.path
            .split('/')
            .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
            .collect()
    }

    /// Reject malformed ids and path templates.
    pub(crate) fn check(&self) -> Result<(), SetupError> {
        if self.id.trim().is_empty() {
            return Err(SetupError::invalid(&self.path, "operation id must not be empty"));
        }
        if !self.path.starts_with('/') {
            return Err(SetupError::invalid(&self.id, "path must start with '/'"));
        }
        let opens = self.path.matches('{').count();
        let closes = self.path.matches('}').count();
        if opens != closes || opens != self.path_params().len() {
            return Err(SetupError::invalid(
                &self.id,
                format!("malformed path template '{}'", self.path),
            ));
        }
        if let Some(status) = self.default_status {
            if !(100..=599).contains(&status) {
                return Err(SetupError::invalid(&self.id, format!("invalid default status {status}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_params_are_extracted() {
        let op = Operation::get("get-item", "/things/{thing-id}/items/{id}");
        assert_eq!(op.path_params(), vec!["thing-id", "id"]);
        assert!(op.check().is_ok());
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(Operation::get("a", "no-slash").check().is_err());
        assert!(Operation::get("a", "/x/{id").check().is_err());
        assert!(Operation::get("", "/x").check().is_err());
        assert!(Operation::get("a", "/x").default_status(42).check().is_err());
    }
}
