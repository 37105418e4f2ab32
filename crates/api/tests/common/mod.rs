//! Common test utilities for integration tests.
//!
//! Every test builds its own app over a fresh in-memory store, so tests run
//! in parallel without a database.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use domain::store::memory::MemoryStore;
use fleet_tracker_api::{
    app::{build_services, create_app, AppState},
    config::Config,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_KEY: &str = "ft_integration0abcdefghijklmnopqrstu";

/// Test configuration with the bootstrap admin key set.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut all = vec![("auth.bootstrap_admin_key", ADMIN_KEY)];
    all.extend_from_slice(overrides);
    Config::load_for_test(&all).expect("test config")
}

pub async fn create_test_app_with(overrides: &[(&str, &str)]) -> Router {
    let config = test_config(overrides);
    let store = Arc::new(MemoryStore::new());
    let services = build_services(&config, store)
        .await
        .expect("services");
    create_app(AppState::new(config, services, "memory"))
}

pub async fn create_test_app() -> Router {
    create_test_app_with(&[]).await
}

pub async fn parse_response_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&body).unwrap_or_else(|_| {
        panic!(
            "Failed to parse response body: {:?}",
            String::from_utf8_lossy(&body)
        )
    })
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, parse_response_body(response).await)
}

fn with_body(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    with_body(Request::builder().method(method).uri(uri), Some(body))
}

pub fn admin_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    with_body(
        Request::builder()
            .method(method)
            .uri(uri)
            .header("X-API-Key", ADMIN_KEY),
        body,
    )
}

pub fn agent_request(method: Method, uri: &str, token: &str, body: Value) -> Request<Body> {
    with_body(
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token)),
        Some(body),
    )
}

/// A registered agent: device id plus bearer token.
pub struct TestAgent {
    pub device_id: String,
    pub token: String,
}

pub async fn register_agent(app: &Router, serial: &str) -> TestAgent {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/agent/register",
            json!({ "serial_number": serial, "hostname": format!("host-{}", serial) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
    TestAgent {
        device_id: body["device_id"].as_str().unwrap().to_string(),
        token: body["agent_token"].as_str().unwrap().to_string(),
    }
}

pub fn ping_body(latitude: f64, longitude: f64) -> Value {
    json!({
        "latitude": latitude,
        "longitude": longitude,
        "accuracy_meters": 10.0,
        "source": "gps",
        "battery_percent": 75
    })
}

pub async fn ping(app: &Router, agent: &TestAgent, latitude: f64, longitude: f64) -> Value {
    let (status, body) = send(
        app,
        agent_request(
            Method::POST,
            "/agent/ping",
            &agent.token,
            ping_body(latitude, longitude),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "ping failed: {}", body);
    body
}

pub async fn enqueue(app: &Router, command: &str, device_id: &str) -> (StatusCode, Value) {
    send(
        app,
        admin_request(
            Method::POST,
            &format!("/commands/{}/{}", command, device_id),
            None,
        ),
    )
    .await
}

pub async fn report(
    app: &Router,
    agent: &TestAgent,
    command_id: &str,
    body: Value,
) -> (StatusCode, Value) {
    send(
        app,
        agent_request(
            Method::POST,
            &format!("/agent/commands/{}/result", command_id),
            &agent.token,
            body,
        ),
    )
    .await
}
