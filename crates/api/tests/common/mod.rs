#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use taxroll_api::config::ServerConfig;
use taxroll_api::router::build_app_router;
use taxroll_api::state::AppState;
use taxroll_core::property::PropertyRecord;
use taxroll_engine::store::MemoryStore;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        rule_seed_created_by: "system".to_string(),
    }
}

/// Build the full application router over an in-memory store.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout,
/// tracing, panic recovery) that production uses. Returns the store so
/// tests can seed properties directly.
pub fn build_test_app() -> (Router, Arc<MemoryStore>) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), config.clone());
    (build_app_router(state, &config), store)
}

/// Seed one property with a parcel number and assessed value.
pub async fn seed_property(store: &MemoryStore, parcel: &str, assessed_value: i64) -> i64 {
    store
        .insert_property(PropertyRecord {
            parcel_number: parcel.to_string(),
            county: "Thurston".to_string(),
            assessed_value: Some(assessed_value),
            ..Default::default()
        })
        .await
}

/// Send a GET request through the router.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body through the router.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with an empty body through the router.
pub async fn post_empty(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a PATCH request with a JSON body through the router.
pub async fn patch_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::PATCH)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
