//! HTTP handlers for the exporter endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::export::{influx, prometheus};
use crate::exporter::Exporter;
use crate::web::config::WebConfig;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<Exporter>,
    pub config: Arc<WebConfig>,
}

/// Run a collection pass and render it for Prometheus.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.exporter.scrape_prometheus().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Run a collection pass and render it as line protocol.
pub async fn influx(State(state): State<AppState>) -> Response {
    match state.exporter.scrape_influx().await {
        Ok(body) => ([(header::CONTENT_TYPE, influx::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to collect line protocol: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error getting modems: {}", e),
            )
                .into_response()
        }
    }
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Landing page linking the exposition endpoints.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<html>
<head><title>Modem Exporter</title></head>
<body>
<h1>Modem Exporter</h1>
<p><a href="{telemetry}">Metrics</a></p>
<p><a href="{influx}">Line protocol</a></p>
</body>
</html>
"#,
        telemetry = state.config.telemetry_path,
        influx = state.config.influx_path,
    ))
}
