//! Configuration file
//!
//! One JSON document with `server`, `presence` and `client` sections. Every
//! field has a default, so an absent file or an empty object is valid.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{
    ChannelConfig, HttpPublisher, RetryPolicy, SessionOptions, SessionResult,
};
use crate::http_server::HttpServerConfig;
use crate::observability::Severity;
use crate::presence::PresenceConfig;

use super::errors::{CliError, CliResult};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub presence: PresenceConfig,

    #[serde(default)]
    pub client: ClientConfig,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: HttpServerConfig::default(),
            presence: PresenceConfig::default(),
            client: ClientConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Settings used by `join` and `users`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the write endpoint
    pub server_url: String,
    /// Broadcast channel URL (ws or wss)
    pub channel_url: String,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub publish_timeout_ms: u64,
    pub geolocation_timeout_ms: u64,
    pub publish_retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:54321".to_string(),
            channel_url: "ws://127.0.0.1:54321/realtime/ws".to_string(),
            reconnect_initial_ms: 500,
            reconnect_max_ms: 10_000,
            publish_timeout_ms: 5_000,
            geolocation_timeout_ms: 10_000,
            publish_retry: RetryPolicy::no_retry(),
        }
    }
}

impl ClientConfig {
    pub fn reconnect_policy(&self) -> RetryPolicy {
        RetryPolicy::unlimited(
            Duration::from_millis(self.reconnect_initial_ms),
            Duration::from_millis(self.reconnect_max_ms),
        )
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            channel: ChannelConfig::new(self.channel_url.clone(), self.reconnect_policy()),
            geolocation_timeout: Duration::from_millis(self.geolocation_timeout_ms),
        }
    }

    pub fn publisher(&self) -> SessionResult<HttpPublisher> {
        HttpPublisher::new(
            &self.server_url,
            Duration::from_millis(self.publish_timeout_ms),
            self.publish_retry.clone(),
        )
    }

    fn validate(&self) -> CliResult<()> {
        check_url("client.server_url", &self.server_url, &["http", "https"])?;
        check_url("client.channel_url", &self.channel_url, &["ws", "wss"])?;

        if self.reconnect_initial_ms == 0 {
            return Err(CliError::config_error("client.reconnect_initial_ms must be > 0"));
        }
        if self.reconnect_max_ms < self.reconnect_initial_ms {
            return Err(CliError::config_error(
                "client.reconnect_max_ms must be >= client.reconnect_initial_ms",
            ));
        }
        if self.publish_timeout_ms == 0 {
            return Err(CliError::config_error("client.publish_timeout_ms must be > 0"));
        }
        if self.geolocation_timeout_ms == 0 {
            return Err(CliError::config_error("client.geolocation_timeout_ms must be > 0"));
        }
        Ok(())
    }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> CliResult<()> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| CliError::config_error(format!("Invalid {}: '{}': {}", field, value, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(CliError::config_error(format!(
            "Invalid {}: scheme must be one of {}",
            field,
            schemes.join(", ")
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.server.port == 0 {
            return Err(CliError::config_error("server.port must be > 0"));
        }
        if self.server.max_write_bytes == 0 {
            return Err(CliError::config_error("server.max_write_bytes must be > 0"));
        }
        if self.presence.channel_buffer == 0 {
            return Err(CliError::config_error("presence.channel_buffer must be > 0"));
        }
        if self.presence.sweep_interval_secs == 0 {
            return Err(CliError::config_error("presence.sweep_interval_secs must be > 0"));
        }
        self.severity()?;
        self.client.validate()
    }

    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse()
            .map_err(|e: String| CliError::config_error(format!("Invalid log_level: {}", e)))
    }
}
