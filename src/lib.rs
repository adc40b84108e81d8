//! # Modem Exporter
//!
//! Telemetry exporter for cellular modems managed by ModemManager.
//!
//! Every request to one of the exposition endpoints lists the modems known
//! to the backend, reads a best-effort snapshot of each, derives secondary
//! values and renders the result in one of two formats:
//!
//! - **Prometheus text exposition** on the telemetry path (`/metrics`)
//! - **InfluxDB line protocol** on the influx path (`/influx`)
//!
//! When an APN is configured, modems stuck in the registered state get
//! their bearers torn down and a fresh connection attempt.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modem_exporter::{start_web_server, Exporter, ExporterConfig, MmcliManager, WebConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = Arc::new(MmcliManager::new("mmcli"));
//!     let exporter = Arc::new(Exporter::new(manager, ExporterConfig::from_env())?);
//!
//!     start_web_server(WebConfig::default(), exporter).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod exporter;
pub mod metrics;
pub mod modem;
pub mod web;

// Re-export public API
pub use config::ExporterConfig;
pub use error::{ExporterError, Result};
pub use export::{PullEmitter, PushEmitter};
pub use exporter::Exporter;
pub use metrics::{CollectedModem, PipelineProfile};
pub use modem::{Bearer, MmcliManager, Modem, ModemManager};
pub use web::{start_web_server, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 9898;

/// The default deadline for processing a single modem, in seconds
pub const DEFAULT_MODEM_TIMEOUT_SECS: u64 = 60;
