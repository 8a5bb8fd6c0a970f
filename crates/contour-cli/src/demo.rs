//! # Demo API
//!
//! The operations `contour serve` exposes:
//!
//! - `POST /greeting/{name}` — path, query and body binding with defaults.
//! - `GET /health` — no input, no body (204).
//! - `GET /items/{id}` and `PUT /items/{id}` — an in-memory resource with
//!   `ETag` / `Last-Modified`, plus the generated `PATCH /items/{id}`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use chrono::{DateTime, SubsecRound, Utc};
use contour_api::autopatch::PatchState;
use contour_api::conditional::{self, etag_for};
use contour_api::{auto_patch, Api, ApiError, AxumAdapter, Config, Empty, Operation, SetupError};
use contour_schema::{Reflect, TypeDef};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// -- Greeting -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GreetingBody {
    pub suffix: String,
}

impl Reflect for GreetingBody {
    fn reflect() -> TypeDef {
        TypeDef::object().field::<String>(
            "suffix",
            &[("maxLength", "5"), ("default", "!"), ("doc", "Appended to the name")],
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct GreetingInput {
    pub name: String,
    pub num: i64,
    pub body: GreetingBody,
}

impl Reflect for GreetingInput {
    fn reflect() -> TypeDef {
        TypeDef::object()
            .field::<String>("name", &[("path", "name"), ("maxLength", "30"), ("example", "world")])
            .field::<i64>(
                "num",
                &[("query", "num"), ("minimum", "0"), ("default", "7"), ("doc", "Lucky number")],
            )
            .field::<GreetingBody>("body", &[("body", "")])
    }
}

#[derive(Debug, Serialize)]
pub struct Greeting {
    pub message: String,
}

impl Reflect for Greeting {
    fn reflect() -> TypeDef {
        TypeDef::object()
            .doc("A personalised greeting")
            .field::<String>("message", &[("example", "Hello, world!")])
    }
}

#[derive(Debug, Serialize)]
pub struct GreetingOutput {
    pub body: Greeting,
}

impl Reflect for GreetingOutput {
    fn reflect() -> TypeDef {
        TypeDef::object().field::<Greeting>("body", &[("body", "")])
    }
}

async fn greet(input: GreetingInput) -> Result<GreetingOutput, ApiError> {
    Ok(GreetingOutput {
        body: Greeting {
            message: format!("Hello, {}{} Your number is {}.", input.name, input.body.suffix, input.num),
        },
    })
}

// -- Items --------------------------------------------------------------------

/// A stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Item {
    pub name: String,
    pub count: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Reflect for Item {
    fn reflect() -> TypeDef {
        TypeDef::object()
            .deny_unknown_fields()
            .field::<String>("name", &[("minLength", "1"), ("maxLength", "32")])
            .field::<i64>("count", &[("minimum", "0")])
            .field::<Vec<String>>("tags", &[("uniqueItems", "true"), ("default", "[]")])
    }
}

#[derive(Debug, Deserialize)]
pub struct GetItem {
    pub id: String,
    #[serde(flatten)]
    pub conditional: conditional::Params,
}

impl Reflect for GetItem {
    fn reflect() -> TypeDef {
        TypeDef::object()
            .field::<String>("id", &[("path", "id"), ("pattern", "^[a-z0-9-]+$")])
            .embed::<conditional::Params>()
    }
}

#[derive(Debug, Deserialize)]
pub struct PutItem {
    pub id: String,
    #[serde(flatten)]
    pub conditional: conditional::Params,
    pub body: Item,
}

impl Reflect for PutItem {
    fn reflect() -> TypeDef {
        TypeDef::object()
            .field::<String>("id", &[("path", "id"), ("pattern", "^[a-z0-9-]+$")])
            .embed::<conditional::Params>()
            .field::<Item>("body", &[("body", "")])
    }
}

#[derive(Debug, Serialize)]
pub struct ItemOutput {
    pub status: u16,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub body: Item,
}

impl Reflect for ItemOutput {
    fn reflect() -> TypeDef {
        TypeDef::object()
            .field::<u16>("status", &[("status", "")])
            .field::<String>("etag", &[("header", "ETag")])
            .field::<DateTime<Utc>>("last_modified", &[("header", "Last-Modified")])
            .field::<Item>("body", &[("body", "")])
    }
}

#[derive(Debug, Clone)]
struct Entry {
    item: Item,
    modified: DateTime<Utc>,
}

impl Entry {
    fn etag(&self) -> String {
        serde_json::to_value(&self.item)
            .map(|v| etag_for(&v))
            .unwrap_or_default()
    }

    fn output(&self, status: u16) -> ItemOutput {
        ItemOutput {
            status,
            etag: self.etag(),
            last_modified: self.modified,
            body: self.item.clone(),
        }
    }
}

/// In-memory item store shared by the GET and PUT handlers.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl ItemStore {
    /// Store seeded with one item under `demo`.
    pub fn seeded() -> Self {
        let store = Self::default();
        store.put(
            "demo",
            Item {
                name: "Demo item".to_string(),
                count: 1,
                tags: vec!["sample".to_string()],
            },
        );
        store
    }

    /// Current value of `id`.
    pub fn get(&self, id: &str) -> Option<Item> {
        self.entries.read().get(id).map(|e| e.item.clone())
    }

    fn put(&self, id: &str, item: Item) -> (Entry, bool) {
        // Last-Modified has second precision.
        let entry = Entry {
            item,
            modified: Utc::now().trunc_subsecs(0),
        };
        let created = self
            .entries
            .write()
            .insert(id.to_string(), entry.clone())
            .is_none();
        (entry, created)
    }

    async fn fetch(&self, input: GetItem) -> Result<ItemOutput, ApiError> {
        let entry = self
            .entries
            .read()
            .get(&input.id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("item '{}'", input.id)))?;
        input
            .conditional
            .check_preconditions(&Method::GET, &entry.etag(), Some(entry.modified))?;
        Ok(entry.output(0))
    }

    async fn replace(&self, input: PutItem) -> Result<ItemOutput, ApiError> {
        let current = self.entries.read().get(&input.id).cloned();
        match current {
            Some(entry) => input.conditional.check_preconditions(
                &Method::PUT,
                &entry.etag(),
                Some(entry.modified),
            )?,
            None if input.conditional.if_match.is_some() => {
                return Err(ApiError::PreconditionFailed(format!(
                    "item '{}' does not exist",
                    input.id
                )))
            }
            None => {}
        }
        let (entry, created) = self.put(&input.id, input.body);
        tracing::info!(id = %input.id, created, "stored item");
        Ok(entry.output(if created { 201 } else { 0 }))
    }
}

/// Assemble the demo API on an axum adapter.
pub fn build_api(config: Config, store: ItemStore) -> Result<Api<AxumAdapter>, SetupError> {
    let mut api = Api::new(config, AxumAdapter::new())?;

    api.register(
        Operation::post("post-greeting", "/greeting/{name}")
            .summary("Get a greeting")
            .tag("greetings"),
        greet,
    )?;

    api.register(
        Operation::get("get-health", "/health").summary("Health check"),
        |_: Empty| async { Ok::<_, ApiError>(Empty {}) },
    )?;

    let reader = store.clone();
    api.register(
        Operation::get("get-item", "/items/{id}")
            .summary("Get item")
            .tag("items"),
        move |input: GetItem| {
            let store = reader.clone();
            async move { store.fetch(input).await }
        },
    )?;

    let writer = store;
    api.register(
        Operation::put("put-item", "/items/{id}")
            .summary("Create or replace item")
            .tag("items"),
        move |input: PutItem| {
            let store = writer.clone();
            async move { store.replace(input).await }
        },
    )?;

    let states = auto_patch(&mut api)?;
    let generated = states
        .values()
        .filter(|s| **s == PatchState::PatchRegistered)
        .count();
    tracing::debug!(generated, "PATCH generation complete");
    Ok(api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(store: ItemStore) -> axum::Router {
        build_api(Config::new("Demo", "0.1.0"), store)
            .unwrap()
            .into_router()
    }

    async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn greeting_uses_defaults() {
        let response = app(ItemStore::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/greeting/world")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Hello, world! Your number is 7.");
    }

    #[tokio::test]
    async fn health_has_no_body() {
        let response = app(ItemStore::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn put_creates_then_get_returns_validators() {
        let store = ItemStore::default();
        let router = app(store.clone());
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/items/abc")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name": "A", "count": 2}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.get("abc").unwrap().tags, Vec::<String>::new());

        let response = router
            .oneshot(Request::builder().uri("/items/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("etag"));
        assert!(response.headers()["last-modified"]
            .to_str()
            .unwrap()
            .ends_with("GMT"));
    }

    #[tokio::test]
    async fn generated_patch_updates_seeded_item() {
        let store = ItemStore::seeded();
        let response = app(store.clone())
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/items/demo")
                    .header("content-type", "application/merge-shorthand+json")
                    .body(Body::from(r#"{"count": 5, "tags[1]": "patched"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let item = store.get("demo").unwrap();
        assert_eq!(item.count, 5);
        assert_eq!(item.tags, vec!["sample", "patched"]);
    }

    #[tokio::test]
    async fn patch_breaking_constraints_is_rejected() {
        let store = ItemStore::seeded();
        let response = app(store.clone())
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/items/demo")
                    .header("content-type", "application/merge-patch+json")
                    .body(Body::from(r#"{"count": -1, "extra": true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["details"].as_array().unwrap().len(), 2);
        assert_eq!(store.get("demo").unwrap().count, 1);
    }
}
