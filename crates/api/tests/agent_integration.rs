//! Integration tests for the agent endpoints: registration, check-in and
//! result reporting.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    agent_request, create_test_app, create_test_app_with, enqueue, json_request, ping, ping_body,
    register_agent, report, send,
};
use serde_json::json;

#[tokio::test]
async fn test_register_returns_device_and_token() {
    let app = create_test_app().await;
    let agent = register_agent(&app, "SN-0001").await;

    assert!(!agent.device_id.is_empty());
    assert!(agent.token.starts_with("fta_"));
}

#[tokio::test]
async fn test_register_responds_with_plain_ok() {
    let app = create_test_app().await;
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/agent/register",
            json!({ "serial_number": "SN-STATUS", "hostname": "h" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["agent_token"].as_str().unwrap().starts_with("fta_"));
}

#[tokio::test]
async fn test_register_rejects_invalid_serial() {
    let app = create_test_app().await;
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/agent/register",
            json!({ "serial_number": "bad serial!", "hostname": "h" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_reregister_rotates_token() {
    let app = create_test_app().await;
    let first = register_agent(&app, "SN-ROTATE").await;
    let second = register_agent(&app, "SN-ROTATE").await;

    assert_eq!(first.device_id, second.device_id);
    assert_ne!(first.token, second.token);

    let (status, _) = send(
        &app,
        agent_request(Method::POST, "/agent/ping", &first.token, ping_body(1.0, 1.0)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    ping(&app, &second, 1.0, 1.0).await;
}

#[tokio::test]
async fn test_registration_code_required_when_configured() {
    let app = create_test_app_with(&[("agent.registration_code", "join-fleet")]).await;

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/agent/register",
            json!({ "serial_number": "SN-CODE", "hostname": "h" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/agent/register",
            json!({ "serial_number": "SN-CODE", "hostname": "h", "registration_code": "join-fleet" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_ping_without_token_is_unauthorized() {
    let app = create_test_app().await;
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/agent/ping", ping_body(1.0, 1.0)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_ping_with_unknown_token_is_unauthorized() {
    let app = create_test_app().await;
    let (status, _) = send(
        &app,
        agent_request(
            Method::POST,
            "/agent/ping",
            "fta_doesnotexist0123456789",
            ping_body(1.0, 1.0),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ping_rejects_out_of_range_coordinates() {
    let app = create_test_app().await;
    let agent = register_agent(&app, "SN-RANGE").await;
    let (status, _) = send(
        &app,
        agent_request(Method::POST, "/agent/ping", &agent.token, ping_body(91.0, 0.0)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ping_with_nothing_queued() {
    let app = create_test_app().await;
    let agent = register_agent(&app, "SN-IDLE").await;
    let body = ping(&app, &agent, 48.15, 17.11).await;

    assert_eq!(body["status"], "ok");
    assert!(body["command"].is_null());
}

#[tokio::test]
async fn test_ping_delivers_command_once() {
    let app = create_test_app().await;
    let agent = register_agent(&app, "SN-DELIVER").await;
    let (status, queued) = enqueue(&app, "restart", &agent.device_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let body = ping(&app, &agent, 1.0, 1.0).await;
    assert_eq!(body["command"]["id"], queued["command_id"]);
    assert_eq!(body["command"]["type"], "restart");

    let body = ping(&app, &agent, 1.0, 1.0).await;
    assert!(body["command"].is_null());
}

#[tokio::test]
async fn test_result_reporting_is_idempotent() {
    let app = create_test_app().await;
    let agent = register_agent(&app, "SN-RESULT").await;
    let (_, queued) = enqueue(&app, "restart", &agent.device_id).await;
    let command_id = queued["command_id"].as_str().unwrap().to_string();
    ping(&app, &agent, 1.0, 1.0).await;

    let (status, body) = report(&app, &agent, &command_id, json!({ "outcome": "executed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "executed");
    assert_eq!(body["changed"], true);

    let (status, body) = report(&app, &agent, &command_id, json!({ "outcome": "executed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);

    let (status, body) = report(&app, &agent, &command_id, json!({ "outcome": "failed" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state_transition");
}

#[tokio::test]
async fn test_result_for_other_devices_command_is_forbidden() {
    let app = create_test_app().await;
    let owner = register_agent(&app, "SN-OWNER").await;
    let other = register_agent(&app, "SN-OTHER").await;
    let (_, queued) = enqueue(&app, "restart", &owner.device_id).await;
    ping(&app, &owner, 1.0, 1.0).await;

    let (status, _) = report(
        &app,
        &other,
        queued["command_id"].as_str().unwrap(),
        json!({ "outcome": "executed" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_result_for_unknown_command_is_not_found() {
    let app = create_test_app().await;
    let agent = register_agent(&app, "SN-UNKNOWN").await;
    let (status, _) = report(
        &app,
        &agent,
        &uuid::Uuid::new_v4().to_string(),
        json!({ "outcome": "executed" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
