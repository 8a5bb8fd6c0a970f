//! # OpenAPI Document
//!
//! An OpenAPI 3.1 document assembled from registered operations. Paths are
//! added as operations register; `components.schemas` is filled from the
//! registry when the document is rendered, so schemas registered after an
//! operation still appear.

use std::collections::BTreeMap;

use contour_schema::{Registry, Schema, SchemaType};
use serde::Serialize;

use crate::binding::InputPlan;
use crate::config::Config;
use crate::operation::Operation;
use crate::output::OutputPlan;

/// Root document.
#[derive(Debug, Clone, Serialize)]
pub struct OpenApi {
    pub openapi: String,
    pub info: Info,
    pub paths: BTreeMap<String, BTreeMap<String, OperationDoc>>,
    #[serde(skip_serializing_if = "Components::is_empty")]
    pub components: Components,
}

#[derive(Debug, Clone, Serialize)]
pub struct Info {
    pub title: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Components {
    pub schemas: BTreeMap<String, Schema>,
}

impl Components {
    fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDoc {
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyDoc>,
    pub responses: BTreeMap<String, ResponseDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterDoc {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestBodyDoc {
    pub required: bool,
    pub content: BTreeMap<String, MediaTypeDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaTypeDoc {
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseDoc {
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, HeaderDoc>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaTypeDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeaderDoc {
    pub schema: Schema,
}

impl OpenApi {
    pub fn new(config: &Config) -> Self {
        Self {
            openapi: "3.1.0".to_string(),
            info: Info {
                title: config.title.clone(),
                version: config.version.clone(),
            },
            paths: BTreeMap::new(),
            components: Components::default(),
        }
    }

    /// Add or replace the entry for `operation`.
    pub fn add(&mut self, operation: &Operation, doc: OperationDoc) {
        self.paths
            .entry(operation.path.clone())
            .or_default()
            .insert(operation.method.as_str().to_ascii_lowercase(), doc);
    }

    /// Look up an operation entry.
    pub fn operation(&self, path: &str, method: &str) -> Option<&OperationDoc> {
        self.paths.get(path).and_then(|item| item.get(method))
    }

    /// Snapshot with `components.schemas` filled from `registry`.
    pub fn with_components(&self, registry: &Registry) -> Self {
        let mut doc = self.clone();
        doc.components.schemas = registry
            .map()
            .into_iter()
            .map(|(name, schema)| (name, (*schema).clone()))
            .collect();
        doc
    }
}

impl OperationDoc {
    /// Describe an operation from its binding and rendering plans.
    pub fn describe(operation: &Operation, input: &InputPlan, output: &OutputPlan) -> Self {
        let parameters = input
            .params
            .iter()
            .filter_map(|p| {
                Some(ParameterDoc {
                    name: p.location.param_name()?.to_string(),
                    location: p.location.param_in()?.to_string(),
                    required: p.required,
                    description: p.schema.description.clone(),
                    schema: p.schema.clone(),
                })
            })
            .collect();

        let request_body = input.body.as_ref().map(|body| RequestBodyDoc {
            required: body.required,
            content: json_content(body.schema.clone()),
        });

        let mut responses = BTreeMap::new();
        responses.insert(output.default_status.as_u16().to_string(), success_response(output));
        responses.insert("default".to_string(), error_response());

        Self {
            operation_id: operation.id.clone(),
            summary: operation.summary.clone(),
            description: operation.description.clone(),
            tags: operation.tags.clone(),
            parameters,
            request_body,
            responses,
        }
    }
}

fn json_content(schema: Schema) -> BTreeMap<String, MediaTypeDoc> {
    BTreeMap::from([("application/json".to_string(), MediaTypeDoc { schema })])
}

fn success_response(output: &OutputPlan) -> ResponseDoc {
    let headers = output
        .headers
        .iter()
        .map(|h| {
            let doc = HeaderDoc {
                schema: Schema::of_type(SchemaType::String),
            };
            (h.name.as_str().to_string(), doc)
        })
        .collect();
    let content = output
        .body_schema
        .clone()
        .map(json_content)
        .unwrap_or_default();
    ResponseDoc {
        description: output
            .default_status
            .canonical_reason()
            .unwrap_or("Success")
            .to_string(),
        headers,
        content,
    }
}

fn error_response() -> ResponseDoc {
    ResponseDoc {
        description: "Error".to_string(),
        headers: BTreeMap::new(),
        content: BTreeMap::from([(
            "application/json".to_string(),
            MediaTypeDoc {
                schema: Schema::of_type(SchemaType::Object),
            },
        )]),
    }
}
