//! ==============================================================================
//! error.rs - error taxonomy
//! ==============================================================================
//!
//! purpose:
//! ```text
//!     typed errors for each boundary of the dashboard.
//!
//!     - ConfigError: fatal at start-up (missing upstream url/key, bad registry)
//!     - FetchError:  one upstream request failed; always folded into a
//!                    Reading::Error by the fetcher, never crosses a cycle
//!     - ApiError:    inbound http failures, rendered as `{ "error": ... }`
//! ```
//!
//! ==============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Duplicate group name: {0}")]
    DuplicateGroup(String),

    #[error("Duplicate controller name {controller} in group {group}")]
    DuplicateController { group: String, controller: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream responded with status {status}")]
    Status { status: reqwest::StatusCode },

    #[error("invalid response body: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("MAC address is required")]
    MissingMac,

    #[error("{0}")]
    InvalidQuery(String),

    #[error("Failed to fetch data: {0}")]
    Upstream(#[from] FetchError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingMac => StatusCode::BAD_REQUEST,
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
