//! HTTP surface of the exporter.
//!
//! Both exposition endpoints collect on demand: every request runs a full
//! pass over the modems before answering.

pub mod config;
pub mod handlers;
pub mod router;

pub use config::WebConfig;
pub use router::create_app;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::error::{ExporterError, Result};
use crate::exporter::Exporter;

/// Start the web server and serve until it fails.
pub async fn start_web_server(config: WebConfig, exporter: Arc<Exporter>) -> Result<()> {
    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| ExporterError::config_error(format!("Invalid bind address: {}", e)))?;

    let telemetry_path = config.telemetry_path.clone();
    let influx_path = config.influx_path.clone();
    let app = create_app(config, exporter)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Listening on http://{}", addr);
    info!("Metrics available at http://{}{}", addr, telemetry_path);
    info!("Line protocol available at http://{}{}", addr, influx_path);

    axum::serve(listener, app)
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}
