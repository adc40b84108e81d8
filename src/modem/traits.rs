//! Traits for the modem-management backend.
//!
//! The exporter never talks to hardware directly. Everything it knows
//! about a modem comes through these traits, which keeps the collection
//! pipeline testable against an in-memory backend.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::modem::types::*;

/// Entry point of the modem-management service.
#[async_trait]
pub trait ModemManager: Send + Sync {
    /// Version string of the backing service.
    async fn version(&self) -> Result<String>;

    /// Restrict the backing service's own log output to the given level.
    async fn set_logging(&self, level: &str) -> Result<()>;

    /// Enumerate every modem currently known to the service.
    async fn list_modems(&self) -> Result<Vec<Arc<dyn Modem>>>;
}

/// A single modem.
///
/// Each call is an independent round-trip to the backend; nothing is
/// cached between calls.
#[async_trait]
pub trait Modem: Send + Sync {
    /// Backend object path of this modem.
    fn path(&self) -> &str;

    async fn state(&self) -> Result<ModemState>;

    async fn enable(&self) -> Result<()>;

    async fn state_failed_reason(&self) -> Result<String>;

    async fn sim(&self) -> Result<SimInfo>;

    async fn three_gpp(&self) -> Result<ThreeGppInfo>;

    async fn access_technologies(&self) -> Result<Vec<AccessTechnology>>;

    async fn location(&self) -> Result<LocationInfo>;

    async fn bearers(&self) -> Result<Vec<Arc<dyn Bearer>>>;

    async fn delete_bearer(&self, bearer: &dyn Bearer) -> Result<()>;

    /// Establish a data session on `apn`, returning the bearer it created.
    async fn connect(&self, apn: &str) -> Result<Arc<dyn Bearer>>;

    /// Configure extended signal reporting; a rate of zero disables it.
    async fn setup_signal(&self, rate_seconds: u32) -> Result<()>;

    async fn current_signals(&self) -> Result<Vec<SignalSample>>;

    async fn own_numbers(&self) -> Result<Vec<String>>;

    /// Object paths of stored SMS messages.
    async fn messages(&self) -> Result<Vec<String>>;

    async fn power_state(&self) -> Result<PowerState>;

    async fn signal_quality(&self) -> Result<SignalQuality>;
}

/// A data bearer owned by a modem.
#[async_trait]
pub trait Bearer: Send + Sync {
    /// Backend object path of this bearer.
    fn path(&self) -> &str;

    async fn disconnect(&self) -> Result<()>;

    async fn properties(&self) -> Result<BearerProperties>;

    async fn stats(&self) -> Result<BearerStats>;

    /// IPv4 configuration, `None` when the bearer has no IPv4 address.
    async fn ipv4(&self) -> Result<Option<IpConfig>>;

    /// IPv6 configuration, `None` when the bearer has no IPv6 address.
    async fn ipv6(&self) -> Result<Option<IpConfig>>;
}
