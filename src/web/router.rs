//! Web application router and middleware setup.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::error::{ExporterError, Result};
use crate::exporter::Exporter;
use crate::web::config::WebConfig;
use crate::web::handlers::{self, AppState};

/// Create the axum application with all routes and middleware.
pub fn create_app(config: WebConfig, exporter: Arc<Exporter>) -> Result<Router> {
    if config.telemetry_path == config.influx_path {
        return Err(ExporterError::config_error(format!(
            "telemetry and influx endpoints share the path {}",
            config.telemetry_path
        )));
    }
    for path in [&config.telemetry_path, &config.influx_path] {
        if path == "/" || path == "/api/health" {
            return Err(ExporterError::config_error(format!("path {} is reserved", path)));
        }
    }

    let state = AppState {
        exporter,
        config: Arc::new(config.clone()),
    };

    let app = Router::new()
        .route("/", get(handlers::index))
        .route(&config.telemetry_path, get(handlers::metrics))
        .route(&config.influx_path, get(handlers::influx))
        .route("/api/health", get(handlers::health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    Ok(app)
}
