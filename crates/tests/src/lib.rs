//! Helpers for driving the wayfare router in integration tests.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use wayfare_api::{build_app_with, ApiConfig};
use wayfare_search::{FixedRatings, QueryBackend, RatingBackend, ScriptedClient};

pub const TEST_API_KEY: &str = "dev-wayfare-key";

pub async fn scripted_app(client: ScriptedClient, ratings: FixedRatings) -> Router {
    build_app_with(
        ApiConfig::default(),
        QueryBackend::Scripted(client),
        RatingBackend::Fixed(ratings),
    )
    .await
    .expect("app should build")
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", TEST_API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", TEST_API_KEY)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, parsed)
}
