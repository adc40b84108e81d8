//! Exporter configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable naming the APN used for automatic reconnection.
pub const APN_ENV: &str = "MODEM_EXPORTER_APN";

/// Configuration of the collection pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// APN to reconnect registered modems on; `None` disables reconnection
    pub apn: Option<String>,
    /// Deadline for processing one modem; `None` waits forever
    pub modem_timeout: Option<Duration>,
    /// Process modems concurrently instead of one after another
    pub concurrent_modems: bool,
    /// Path of the mmcli binary
    pub mmcli_path: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            apn: None,
            modem_timeout: Some(Duration::from_secs(crate::DEFAULT_MODEM_TIMEOUT_SECS)),
            concurrent_modems: false,
            mmcli_path: "mmcli".to_string(),
        }
    }
}

impl ExporterConfig {
    /// Read the APN from [`APN_ENV`], leaving everything else at defaults.
    pub fn from_env() -> Self {
        Self::default().with_apn(std::env::var(APN_ENV).ok())
    }

    /// Set the reconnection APN. Empty strings disable reconnection.
    pub fn with_apn(mut self, apn: Option<String>) -> Self {
        self.apn = apn.filter(|apn| !apn.trim().is_empty());
        self
    }

    /// Set the per-modem deadline in seconds; zero disables it.
    pub fn with_modem_timeout_secs(mut self, secs: u64) -> Self {
        self.modem_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Enable or disable concurrent processing of modems.
    pub fn with_concurrent_modems(mut self, concurrent: bool) -> Self {
        self.concurrent_modems = concurrent;
        self
    }

    /// Set the mmcli binary path.
    pub fn with_mmcli_path(mut self, path: impl Into<String>) -> Self {
        self.mmcli_path = path.into();
        self
    }
}
