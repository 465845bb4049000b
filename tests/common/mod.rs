#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use grow_dashboard::aggregator::Aggregator;
use grow_dashboard::api::{create_app, ApiState};
use grow_dashboard::config::{ControllerConfig, GroupConfig, UpstreamConfig};
use grow_dashboard::registry::Registry;
use grow_dashboard::upstream::{SensorFetcher, UpstreamClient, UpstreamFetcher};

pub const API_KEY: &str = "test-key";

pub const MAC_OK: &str = "AA:BB:CC";
pub const MAC_EMPTY: &str = "NO:DA:TA";
pub const MAC_ERROR_STATUS: &str = "FA:IL:ED";
pub const MAC_GARBAGE: &str = "BA:DJ:SN";
pub const MAC_SLOW: &str = "SL:OW:00";
pub const MAC_RAW: &str = "RA:W0:00";

/// body with unsorted keys and a trailing-zero number
pub const RAW_BODY: &str = r#"{"zeta":1,"Item":{"tp":"70"},"alpha":2.50}"#;

pub fn item() -> Value {
    json!({
        "hy": "55", "co2": "800", "tp": "70", "light_status": "1",
        "vpd": "1.2", "ct_tm": "12:00", "d_n": "1", "lp": "100",
        "mac": MAC_OK, "timestamp": 1700000000
    })
}

async fn upstream_handler(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Forbidden" }))).into_response();
    }
    if body["cmd"] != "getSensorData" || body["params"]["model"] != "Hydro-X" {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "bad command" }))).into_response();
    }

    match body["params"]["mac"].as_str() {
        Some(MAC_OK) => Json(json!({ "Item": item() })).into_response(),
        Some(MAC_EMPTY) => Json(json!({})).into_response(),
        Some(MAC_ERROR_STATUS) => StatusCode::BAD_GATEWAY.into_response(),
        Some(MAC_GARBAGE) => "<html>not json</html>".into_response(),
        Some(MAC_RAW) => ([(header::CONTENT_TYPE, "application/json")], RAW_BODY).into_response(),
        Some(MAC_SLOW) => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "Item": item() })).into_response()
        }
        _ => Json(json!({ "error": "unknown device" })).into_response(),
    }
}

/// stand-in for the sensor api on an ephemeral port
pub async fn spawn_upstream() -> SocketAddr {
    let app = Router::new().route("/", post(upstream_handler));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    address
}

pub fn upstream_config(address: SocketAddr) -> UpstreamConfig {
    UpstreamConfig {
        url: format!("http://{address}/"),
        api_key: API_KEY.to_string(),
        ..Default::default()
    }
}

pub fn upstream_client(address: SocketAddr) -> UpstreamClient {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    UpstreamClient::with_client(http, upstream_config(address))
}

/// (group, controller, mac) rows; consecutive rows share a group
pub fn registry(rows: &[(&str, &str, &str)]) -> Arc<Registry> {
    let mut groups: Vec<GroupConfig> = Vec::new();
    for (group, name, mac) in rows {
        if groups.last().map(|g| g.name.as_str()) != Some(*group) {
            groups.push(GroupConfig { name: group.to_string(), controllers: Vec::new() });
        }
        if let Some(last) = groups.last_mut() {
            last.controllers.push(ControllerConfig { name: name.to_string(), mac: mac.to_string() });
        }
    }
    Arc::new(Registry::from_groups(groups).unwrap())
}

pub struct MockApp {
    pub router: Router,
    pub aggregator: Arc<Aggregator>,
    pub registry: Arc<Registry>,
}

impl MockApp {
    /// app wired to the mock upstream for both the proxy and the fetcher
    pub async fn new(rows: &[(&str, &str, &str)]) -> Self {
        let address = spawn_upstream().await;
        let client = upstream_client(address);
        let fetcher = Arc::new(UpstreamFetcher::new(client.clone(), false));
        Self::with_fetcher(rows, fetcher, client)
    }

    pub fn with_fetcher(
        rows: &[(&str, &str, &str)],
        fetcher: Arc<dyn SensorFetcher>,
        client: UpstreamClient,
    ) -> Self {
        let registry = registry(rows);
        let aggregator = Arc::new(Aggregator::new(registry.clone(), fetcher));
        let router = create_app(ApiState {
            registry: registry.clone(),
            snapshots: aggregator.reader(),
            upstream: client,
        });
        Self { router, aggregator, registry }
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
