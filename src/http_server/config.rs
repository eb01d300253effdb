//! HTTP Server Configuration
//!
//! Bind address, write size limit and browser-origin policy for the presence
//! server.
//!
//! `cors_origins` is enforced in two places. The CORS layer applies it to
//! `/api/*`. WebSocket upgrades bypass CORS entirely, so `/realtime/ws`
//! compares the upgrade's `Origin` header against the same list and answers
//! 403 on a mismatch. Upgrades that carry no `Origin` (native clients such as
//! the `join` command) are accepted. An empty list allows every origin.

use serde::{Deserialize, Serialize};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 54321)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Browser origins allowed to write and to open channels
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Largest accepted `POST /api/location` body in bytes
    #[serde(default = "default_max_write_bytes")]
    pub max_write_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    54321
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

/// A write is four short fields
fn default_max_write_bytes() -> usize {
    4 * 1024
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            max_write_bytes: default_max_write_bytes(),
        }
    }
}

impl HttpServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether a channel upgrade with this `Origin` header may proceed
    pub fn allows_channel_origin(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.cors_origins.is_empty() => true,
            Some(origin) => self
                .cors_origins
                .iter()
                .any(|allowed| allowed.trim_end_matches('/') == origin),
        }
    }
}
