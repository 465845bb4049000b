//! ==============================================================================
//! api.rs - http surface
//! ==============================================================================
//!
//! routes:
//!     GET /api/sensor?mac=<id>          proxy one upstream read, body verbatim
//!     GET /api/dashboard?group=<all|g>  latest snapshot, filtered by group
//!     GET /api/groups                   group selector options, registry order
//!     GET /health                       liveness + current cycle
//!
//! relationships:
//!     - reads: aggregator.rs (SnapshotReader, never writes)
//!     - uses: upstream.rs (UpstreamClient for the proxy route)
//!
//! ==============================================================================

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::aggregator::SnapshotReader;
use crate::domain::{ControllerSnapshot, ControllerState, Reading, ReadingView};
use crate::error::ApiError;
use crate::registry::{display_label, GroupFilter, Registry};
use crate::upstream::UpstreamClient;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<Registry>,
    pub snapshots: SnapshotReader,
    pub upstream: UpstreamClient,
}

pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .route("/api/sensor", get(sensor_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/groups", get(groups_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Deserialize)]
pub struct SensorQuery {
    mac: Option<String>,
}

/// forwards the upstream json for one controller
async fn sensor_handler(
    State(state): State<ApiState>,
    query: Result<Query<SensorQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let mac = query
        .mac
        .filter(|m| !m.trim().is_empty())
        .ok_or(ApiError::MissingMac)?;

    match state.upstream.sensor_body(&mac).await {
        Ok(body) => Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response()),
        Err(e) => {
            tracing::warn!(%mac, "sensor proxy failed: {e}");
            Err(e.into())
        }
    }
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    group: Option<String>,
}

#[derive(Serialize)]
pub struct ControllerView {
    pub name: String,
    pub mac: String,
    pub state: ControllerState,
    pub is_loading: bool,
    pub reading: Reading,
    pub view: Option<ReadingView>,
}

impl From<&ControllerSnapshot> for ControllerView {
    fn from(snapshot: &ControllerSnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            mac: snapshot.mac.clone(),
            state: snapshot.state(),
            is_loading: snapshot.is_loading,
            reading: snapshot.reading.clone(),
            view: snapshot.view(),
        }
    }
}

#[derive(Serialize)]
pub struct GroupView {
    pub name: String,
    pub label: String,
    pub controllers: Vec<ControllerView>,
}

#[derive(Serialize)]
pub struct DashboardView {
    pub filter: String,
    pub cycle: u64,
    pub refreshed_at_ms: Option<u64>,
    pub initial_loading: bool,
    pub groups: Vec<GroupView>,
}

async fn dashboard_handler(
    State(state): State<ApiState>,
    Query(query): Query<DashboardQuery>,
) -> Json<DashboardView> {
    let filter = query.group.as_deref().map(GroupFilter::parse).unwrap_or_default();
    // one borrow of the watch value: every group comes from the same cycle
    let snapshot = state.snapshots.current();

    let groups = filter
        .apply(&snapshot)
        .into_iter()
        .map(|group| GroupView {
            name: group.name.clone(),
            label: display_label(&group.name),
            controllers: group.controllers.iter().map(ControllerView::from).collect(),
        })
        .collect();

    Json(DashboardView {
        filter: filter.to_string(),
        cycle: snapshot.cycle,
        refreshed_at_ms: snapshot.refreshed_at_ms,
        initial_loading: snapshot.initial_loading,
        groups,
    })
}

#[derive(Serialize)]
pub struct GroupOption {
    pub value: String,
    pub label: String,
}

async fn groups_handler(State(state): State<ApiState>) -> Json<Vec<GroupOption>> {
    let options = std::iter::once(GroupOption {
        value: "all".to_string(),
        label: "All Groups".to_string(),
    })
    .chain(state.registry.group_names().map(|name| GroupOption {
        value: name.to_string(),
        label: display_label(name),
    }))
    .collect();

    Json(options)
}

async fn health_handler(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let snapshot = state.snapshots.current();
    Json(json!({
        "status": "ok",
        "cycle": snapshot.cycle,
        "initial_loading": snapshot.initial_loading,
    }))
}
