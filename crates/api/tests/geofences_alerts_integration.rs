//! Integration tests for geofence management, transition alerts and alert
//! triage.

mod common;

use axum::http::{Method, StatusCode};
use common::{admin_request, create_test_app, ping, register_agent, send};
use serde_json::{json, Value};

fn circle(name: &str, radius_meters: f64) -> Value {
    json!({
        "name": name,
        "shape": {
            "type": "circle",
            "center_lat": 0.0,
            "center_lon": 0.0,
            "radius_meters": radius_meters
        },
        "alert_severity": "high"
    })
}

async fn create_fence(app: &axum::Router, body: Value) -> Value {
    let (status, fence) = send(app, admin_request(Method::POST, "/admin/geofences", Some(body))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", fence);
    fence
}

async fn alerts(app: &axum::Router, query: &str) -> Vec<Value> {
    let (status, body) = send(
        app,
        admin_request(Method::GET, &format!("/admin/alerts?{}", query), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_create_and_list_geofences() {
    let app = create_test_app().await;
    let fence = create_fence(&app, circle("HQ", 150.0)).await;
    assert_eq!(fence["name"], "HQ");
    assert_eq!(fence["active"], true);
    assert_eq!(fence["shape"]["type"], "circle");

    let (status, list) = send(&app, admin_request(Method::GET, "/admin/geofences", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_create_polygon_geofence() {
    let app = create_test_app().await;
    let fence = create_fence(
        &app,
        json!({
            "name": "Warehouse",
            "shape": {
                "type": "polygon",
                "vertices": [[0.0, 0.0], [0.0, 0.01], [0.01, 0.01], [0.01, 0.0]]
            }
        }),
    )
    .await;
    assert_eq!(fence["shape"]["type"], "polygon");
    assert_eq!(fence["alert_severity"], "medium");
}

#[tokio::test]
async fn test_create_geofence_rejects_bad_geometry() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app,
        admin_request(Method::POST, "/admin/geofences", Some(circle("Zero", 0.0))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        admin_request(
            Method::POST,
            "/admin/geofences",
            Some(json!({
                "name": "Line",
                "shape": { "type": "polygon", "vertices": [[0.0, 0.0], [1.0, 1.0]] }
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_geofence() {
    let app = create_test_app().await;
    let (status, _) = send(
        &app,
        admin_request(
            Method::GET,
            &format!("/admin/geofences/{}", uuid::Uuid::new_v4()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deactivated_geofence_hidden_by_default() {
    let app = create_test_app().await;
    let fence = create_fence(&app, circle("Temp", 100.0)).await;
    let (status, updated) = send(
        &app,
        admin_request(
            Method::PUT,
            &format!("/admin/geofences/{}", fence["id"].as_str().unwrap()),
            Some(json!({ "active": false })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["active"], false);

    let (_, list) = send(&app, admin_request(Method::GET, "/admin/geofences", None)).await;
    assert_eq!(list["total"], 0);
    let (_, list) = send(
        &app,
        admin_request(Method::GET, "/admin/geofences?include_inactive=true", None),
    )
    .await;
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_exit_raises_alert_with_fence_severity() {
    let app = create_test_app().await;
    let fence = create_fence(&app, circle("HQ", 100.0)).await;
    let agent = register_agent(&app, "SN-EXIT").await;

    // First sighting is a baseline.
    ping(&app, &agent, 0.0, 0.0).await;
    assert!(alerts(&app, &format!("device_id={}", agent.device_id)).await.is_empty());

    ping(&app, &agent, 0.0, 0.002).await;
    let raised = alerts(&app, &format!("device_id={}", agent.device_id)).await;
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0]["alert_type"], "geofence_exit");
    assert_eq!(raised[0]["severity"], "high");
    assert_eq!(raised[0]["status"], "unacknowledged");
    assert_eq!(raised[0]["geofence_id"], fence["id"]);

    // Still outside.
    ping(&app, &agent, 0.0, 0.003).await;
    assert_eq!(alerts(&app, &format!("device_id={}", agent.device_id)).await.len(), 1);
}

#[tokio::test]
async fn test_alert_triage_moves_forward_only() {
    let app = create_test_app().await;
    create_fence(&app, circle("HQ", 100.0)).await;
    let agent = register_agent(&app, "SN-TRIAGE").await;
    ping(&app, &agent, 10.0, 10.0).await;
    ping(&app, &agent, 0.0, 0.0).await;

    let raised = alerts(&app, "alert_type=geofence_enter").await;
    assert_eq!(raised.len(), 1);
    let alert_id = raised[0]["id"].as_str().unwrap().to_string();

    let (status, acked) = send(
        &app,
        admin_request(
            Method::POST,
            &format!("/admin/alerts/{}/acknowledge", alert_id),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", acked);
    assert_eq!(acked["status"], "acknowledged");

    let (status, resolved) = send(
        &app,
        admin_request(
            Method::POST,
            &format!("/admin/alerts/{}/resolve", alert_id),
            Some(json!({ "notes": "Employee arrived at the office" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "resolved");
    assert_eq!(resolved["resolution_notes"], "Employee arrived at the office");

    let (status, body) = send(
        &app,
        admin_request(
            Method::POST,
            &format!("/admin/alerts/{}/acknowledge", alert_id),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state_transition");

    assert_eq!(alerts(&app, "status=resolved").await.len(), 1);
    assert!(alerts(&app, "status=unacknowledged").await.is_empty());
}

#[tokio::test]
async fn test_acknowledge_unknown_alert() {
    let app = create_test_app().await;
    let (status, _) = send(
        &app,
        admin_request(
            Method::POST,
            &format!("/admin/alerts/{}/acknowledge", uuid::Uuid::new_v4()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fence_created_after_checkin_still_alerts_on_exit() {
    let app = create_test_app().await;
    let agent = register_agent(&app, "SN-LATEFENCE").await;
    ping(&app, &agent, 0.0, 0.0).await;
    let fence = create_fence(&app, circle("HQ", 100.0)).await;

    ping(&app, &agent, 0.0, 0.002).await;
    let raised = alerts(&app, &format!("device_id={}", agent.device_id)).await;
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0]["alert_type"], "geofence_exit");
    assert_eq!(raised[0]["geofence_id"], fence["id"]);
}
