//! ==============================================================================
//! upstream.rs - sensor api client and reading fetcher
//! ==============================================================================
//!
//! purpose:
//! ```text
//!     one POST per controller to the upstream sensor api:
//!
//!         x-api-key: <credential>
//!         { "cmd": "getSensorData", "params": { "mac": <id>, "model": "Hydro-X" } }
//!
//!     UpstreamClient returns the raw json bytes (forwarded verbatim by the
//!     proxy route). UpstreamFetcher turns that body into a Reading and folds every
//!     failure into Reading::Error, so nothing escapes past a controller slot.
//! ```
//!
//! relationships:
//! ```text
//!     - used by: api.rs (/api/sensor proxy), aggregator.rs (SensorFetcher)
//!     - reads: config.rs (UpstreamConfig)
//! ```
//!
//! ==============================================================================

use async_trait::async_trait;
use axum::body::Bytes;
use serde::de::IgnoredAny;
use serde::Serialize;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::domain::{Reading, SensorItem};
use crate::error::FetchError;

/// fetch one reading for one controller identifier.
/// implementations must capture every failure as `Reading::Error`.
#[async_trait]
pub trait SensorFetcher: Send + Sync {
    async fn fetch(&self, mac: &str) -> Reading;
}

#[derive(Serialize)]
struct SensorRequest<'a> {
    cmd: &'a str,
    params: SensorParams<'a>,
}

#[derive(Serialize)]
struct SensorParams<'a> {
    mac: &'a str,
    model: &'a str,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { http: reqwest::Client::new(), config }
    }

    pub fn with_client(http: reqwest::Client, config: UpstreamConfig) -> Self {
        Self { http, config }
    }

    /// request the current sensor data for `mac`. the body is checked to be
    /// json and returned byte for byte.
    pub async fn sensor_body(&self, mac: &str) -> Result<Bytes, FetchError> {
        let request = SensorRequest {
            cmd: &self.config.command,
            params: SensorParams { mac, model: &self.config.model },
        };

        let response = self
            .http
            .post(&self.config.url)
            .header("x-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice::<IgnoredAny>(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(bytes)
    }

    /// `sensor_body` parsed into a json value
    pub async fn sensor_data(&self, mac: &str) -> Result<Value, FetchError> {
        let bytes = self.sensor_body(mac).await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// interpret an upstream body as a reading
pub fn reading_from_body(body: Value) -> Reading {
    match body {
        Value::Object(mut map) => {
            if let Some(item) = map.remove("Item").filter(|v| !v.is_null()) {
                return match serde_json::from_value::<SensorItem>(item) {
                    Ok(item) => Reading::Data { item },
                    Err(e) => Reading::error(format!("Failed to fetch: invalid Item: {e}")),
                };
            }
            match map.get("error").and_then(Value::as_str) {
                Some(message) => Reading::error(message),
                None => Reading::NoData,
            }
        }
        _ => Reading::NoData,
    }
}

pub struct UpstreamFetcher {
    client: UpstreamClient,
    show_data: bool,
}

impl UpstreamFetcher {
    pub fn new(client: UpstreamClient, show_data: bool) -> Self {
        Self { client, show_data }
    }
}

#[async_trait]
impl SensorFetcher for UpstreamFetcher {
    async fn fetch(&self, mac: &str) -> Reading {
        let reading = match self.client.sensor_data(mac).await {
            Ok(body) => reading_from_body(body),
            Err(e) => Reading::error(format!("Failed to fetch: {e}")),
        };

        match &reading {
            Reading::Data { item } if self.show_data => {
                tracing::info!(mac, tp = %item.tp, hy = %item.hy, co2 = %item.co2, "reading");
            }
            Reading::Data { .. } => tracing::debug!(mac, "reading"),
            Reading::NoData => tracing::debug!(mac, "no data in upstream response"),
            Reading::Error { message } => tracing::warn!(mac, %message, "read error"),
        }

        reading
    }
}
