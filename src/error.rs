//! Error handling for the modem exporter crate.

/// A specialized `Result` type for modem exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// The main error type for modem exporter operations.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// I/O operation failed (spawning the backend, binding a socket)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend output could not be decoded as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Prometheus registry or encoder failure
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// A value reported by the backend could not be interpreted
    #[error("Failed to parse modem data: {0}")]
    ParseError(String),

    /// A call to the modem-management backend failed
    #[error("Modem backend error: {0}")]
    Backend(String),

    /// The identifying tuple of a modem could not be resolved
    #[error("Cannot resolve modem identity: {0}")]
    Identity(String),

    /// The modem is disabled and could not be enabled
    #[error("Modem disabled: {0}")]
    Disabled(String),

    /// Processing a modem exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExporterError {
    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a new backend error
    pub fn backend_error(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a new identity error
    pub fn identity_error(msg: impl Into<String>) -> Self {
        Self::Identity(msg.into())
    }

    /// Create a new disabled-modem error
    pub fn disabled_error(msg: impl Into<String>) -> Self {
        Self::Disabled(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout_error(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
