//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use pipeline_api::{AppState, Stores, build_app, build_state};
use pipeline_cache::CacheManager;
use pipeline_core::config::AppConfig;
use pipeline_database::MemoryStore;
use pipeline_entity::{Person, Tag};

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Shared state, for seeding and direct inspection
    pub state: AppState,
}

impl TestApp {
    /// Application over in-memory stores and cache with default config.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let stores = Stores {
            people: Arc::new(MemoryStore::<Person>::new()),
            tags: Arc::new(MemoryStore::<Tag>::new()),
        };
        let state = build_state(config, stores, CacheManager::in_memory());
        let router = build_app(state.clone());
        Self { router, state }
    }

    /// Make a request with optional JSON body and extra headers
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    /// Send a raw body, for malformed payloads
    pub async fn request_raw(&self, method: &str, path: &str, body: &str) -> TestResponse {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    /// Issue an action token for `user_id` through the API.
    pub async fn token_for(&self, user_id: &str) -> String {
        let resp = self
            .post("/tokens", serde_json::json!({"user_id": user_id}))
            .await;
        assert_eq!(resp.status, StatusCode::OK, "token issue failed: {}", resp.text());
        resp.json()["token"].as_str().unwrap().to_string()
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        TestResponse { status, headers, body }
    }
}

/// Test response wrapper
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Header value parsed as JSON, for `HX-Trigger`.
    pub fn header_json(&self, name: &str) -> Value {
        self.header(name)
            .and_then(|v| serde_json::from_str(v).ok())
            .unwrap_or(Value::Null)
    }

    /// `name=value` part of the first `Set-Cookie` for `name`.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{name}=")))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}
