//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file, applies environment overrides and
//!     refuses to start when the upstream settings are missing.
//!
//! structure:
//!     - UpstreamConfig: sensor API endpoint, credential, command/model tags.
//!     - PollingConfig: how often the silent refresh runs.
//!     - ServerConfig: where the http surface listens.
//!     - LoggingConfig: tracing level, per-reading log lines.
//!     - GroupConfig: the ordered controller registry (room -> controllers).
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "GROW_DASHBOARD_CONFIG";
/// Environment override for `upstream.url`.
pub const API_URL_ENV: &str = "TROLMASTER_API_URL";
/// Environment override for `upstream.api_key`.
pub const API_KEY_ENV: &str = "TROLMASTER_API_KEY";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_command")]
    pub command: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub show_sensor_data: bool,
}

/// One room/location and its controllers, in display order.
#[derive(Debug, Deserialize, Clone)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    pub name: String,
    pub mac: String,
}

fn default_model() -> String {
    "Hydro-X".to_string()
}

fn default_command() -> String {
    "getSensorData".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            model: default_model(),
            command: default_command(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: default_interval() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level(), show_sensor_data: false }
    }
}

impl DashboardConfig {
    /// Parse a config document without consulting the environment.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file, apply env overrides, validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::parse(&content)?
            .with_overrides(std::env::var(API_URL_ENV).ok(), std::env::var(API_KEY_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from `$GROW_DASHBOARD_CONFIG` or the first well-known path that exists.
    pub fn discover() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load(path);
        }

        let paths = [
            PathBuf::from("config").join("dashboard.toml"),
            PathBuf::from("..").join("config").join("dashboard.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(ConfigError::Missing("config/dashboard.toml"))
    }

    /// Environment values win over the file when present and non-blank.
    pub fn with_overrides(mut self, url: Option<String>, api_key: Option<String>) -> Self {
        if let Some(url) = url.filter(|v| !v.trim().is_empty()) {
            self.upstream.url = url;
        }
        if let Some(key) = api_key.filter(|v| !v.trim().is_empty()) {
            self.upstream.api_key = key;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.url.trim().is_empty() {
            return Err(ConfigError::Missing("upstream.url (TROLMASTER_API_URL)"));
        }
        if self.upstream.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("upstream.api_key (TROLMASTER_API_KEY)"));
        }
        if self.polling.interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                name: "polling.interval_seconds",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Log a configuration summary. The api key is never printed.
    pub fn log_summary(&self) {
        let controllers: usize = self.groups.iter().map(|g| g.controllers.len()).sum();
        tracing::info!(
            upstream = %self.upstream.url,
            model = %self.upstream.model,
            interval_seconds = self.polling.interval_seconds,
            listen = %format!("{}:{}", self.server.host, self.server.port),
            groups = self.groups.len(),
            controllers,
            "configuration loaded"
        );
    }
}
