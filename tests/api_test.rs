use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use grow_dashboard::aggregator::AggregationMode;

mod common;
use common::*;

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(Method::GET)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_sensor_requires_mac() {
    let app = MockApp::new(&[("room_a", "Ctrl1", MAC_OK)]).await;

    for uri in ["/api/sensor", "/api/sensor?mac=", "/api/sensor?other=1"] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "MAC address is required" }));
    }
}

#[tokio::test]
async fn test_sensor_forwards_upstream_body() {
    let app = MockApp::new(&[("room_a", "Ctrl1", MAC_OK)]).await;

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/api/sensor?mac={MAC_OK}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_json(response).await, json!({ "Item": item() }));

    // bodies without Item still pass through untouched
    let response = app
        .router
        .clone()
        .oneshot(get("/api/sensor?mac=00:00:00"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "error": "unknown device" }));
}

#[tokio::test]
async fn test_sensor_body_is_passed_through_byte_for_byte() {
    let app = MockApp::new(&[("room_a", "Ctrl1", MAC_RAW)]).await;

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/api/sensor?mac={MAC_RAW}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(std::str::from_utf8(&body).unwrap(), RAW_BODY);
}

#[tokio::test]
async fn test_sensor_raw_body_still_feeds_snapshot() {
    let app = MockApp::new(&[("room_a", "Ctrl1", MAC_RAW)]).await;

    let snapshot = app.aggregator.refresh(AggregationMode::Initial).await;
    let (_, controller) = snapshot.controllers().next().unwrap();
    assert_eq!(controller.reading.item().unwrap().tp, "70");
}

#[tokio::test]
async fn test_sensor_bad_query_is_json_error() {
    let app = MockApp::new(&[("room_a", "Ctrl1", MAC_OK)]).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/sensor?mac=AA&mac=BB"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("mac"), "{message}");
}

#[tokio::test]
async fn test_sensor_upstream_failure_is_server_error() {
    let app = MockApp::new(&[("room_a", "Ctrl1", MAC_OK)]).await;

    for mac in [MAC_ERROR_STATUS, MAC_GARBAGE, MAC_SLOW] {
        let response = app
            .router
            .clone()
            .oneshot(get(&format!("/api/sensor?mac={mac}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Failed to fetch data: "), "{message}");
    }
}

#[tokio::test]
async fn test_groups_in_registry_order() {
    let app = MockApp::new(&[
        ("veg_room", "Veg 1", MAC_OK),
        ("flower_room", "Flower 1", MAC_EMPTY),
    ])
    .await;

    let response = app.router.clone().oneshot(get("/api/groups")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!([
            { "value": "all", "label": "All Groups" },
            { "value": "veg_room", "label": "Veg Room" },
            { "value": "flower_room", "label": "Flower Room" },
        ])
    );
}

#[tokio::test]
async fn test_health_reports_cycle() {
    let app = MockApp::new(&[("room_a", "Ctrl1", MAC_OK)]).await;

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "status": "ok", "cycle": 0, "initial_loading": true })
    );

    app.aggregator.refresh(AggregationMode::Initial).await;

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "status": "ok", "cycle": 1, "initial_loading": false })
    );
}
