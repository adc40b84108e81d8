//! Web server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the web server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Path of the Prometheus exposition
    pub telemetry_path: String,
    /// Path of the line-protocol endpoint
    pub influx_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            telemetry_path: "/metrics".to_string(),
            influx_path: "/influx".to_string(),
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the host for the web server.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port for the web server.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the path of the Prometheus exposition.
    pub fn with_telemetry_path(mut self, path: impl Into<String>) -> Self {
        self.telemetry_path = normalize_path(path.into());
        self
    }

    /// Set the path of the line-protocol endpoint.
    pub fn with_influx_path(mut self, path: impl Into<String>) -> Self {
        self.influx_path = normalize_path(path.into());
        self
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// axum routes must start with a slash.
fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}
