//! ==============================================================================
//! grow-dashboard
//! ==============================================================================
//!
//! polls the upstream sensor api for every registered controller, keeps the
//! latest grouped snapshot in memory and serves it over http.
//!
//! ```text
//!     ┌──────────────────────────────────────────────────────────┐
//!     │  scheduler (initial cycle, then every interval)          │
//!     │      │                                                   │
//!     │      ▼                                                   │
//!     │  aggregator ──spawn──▶ fetch(mac) × N ──▶ upstream api   │
//!     │      │ join_all                                          │
//!     │      ▼                                                   │
//!     │  snapshot store (watch) ──▶ api.rs readers               │
//!     └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ==============================================================================

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::aggregator::Aggregator;
use crate::api::{create_app, ApiState};
use crate::config::DashboardConfig;
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::upstream::{UpstreamClient, UpstreamFetcher};

pub mod aggregator;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod upstream;

/// build every component, start polling and serve until ctrl-c
pub async fn run(config: DashboardConfig) -> anyhow::Result<()> {
    let registry = Arc::new(Registry::from_groups(config.groups.clone())?);
    if registry.is_empty() {
        tracing::warn!("registry has no controllers; snapshots will be empty");
    }

    let upstream = UpstreamClient::new(config.upstream.clone());
    let fetcher = Arc::new(UpstreamFetcher::new(
        upstream.clone(),
        config.logging.show_sensor_data,
    ));
    let aggregator = Arc::new(Aggregator::new(registry.clone(), fetcher));
    let scheduler = Scheduler::new(
        aggregator.clone(),
        Duration::from_secs(config.polling.interval_seconds),
    );

    let app = create_app(ApiState {
        registry,
        snapshots: aggregator.reader(),
        upstream,
    });

    let ip_addr = config
        .server
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("invalid server.host {}", config.server.host))?;
    let address = SocketAddr::from((ip_addr, config.server.port));
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    scheduler.start();
    tracing::info!("dashboard live at http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
