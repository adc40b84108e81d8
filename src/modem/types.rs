//! Values reported by the modem-management backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ExporterError;

/// Operational state of a modem.
///
/// Variants are declared in the backend's numeric order, so the derived
/// `Ord` lets callers write `state >= ModemState::Registered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModemState {
    Failed,
    Unknown,
    Initializing,
    Locked,
    Disabled,
    Disabling,
    Enabling,
    Enabled,
    Searching,
    Registered,
    Disconnecting,
    Connecting,
    Connected,
}

impl ModemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Unknown => "unknown",
            Self::Initializing => "initializing",
            Self::Locked => "locked",
            Self::Disabled => "disabled",
            Self::Disabling => "disabling",
            Self::Enabling => "enabling",
            Self::Enabled => "enabled",
            Self::Searching => "searching",
            Self::Registered => "registered",
            Self::Disconnecting => "disconnecting",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ModemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModemState {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s.trim().to_ascii_lowercase().as_str() {
            "failed" => Self::Failed,
            "unknown" => Self::Unknown,
            "initializing" => Self::Initializing,
            "locked" => Self::Locked,
            "disabled" => Self::Disabled,
            "disabling" => Self::Disabling,
            "enabling" => Self::Enabling,
            "enabled" => Self::Enabled,
            "searching" => Self::Searching,
            "registered" => Self::Registered,
            "disconnecting" => Self::Disconnecting,
            "connecting" => Self::Connecting,
            "connected" => Self::Connected,
            other => {
                return Err(ExporterError::parse_error(format!(
                    "unknown modem state '{}'",
                    other
                )))
            }
        };
        Ok(state)
    }
}

/// 3GPP network registration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationState {
    Idle,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
    HomeSmsOnly,
    RoamingSmsOnly,
    EmergencyOnly,
    HomeCsfbNotPreferred,
    RoamingCsfbNotPreferred,
    AttachedRlos,
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Home => "home",
            Self::Searching => "searching",
            Self::Denied => "denied",
            Self::Unknown => "unknown",
            Self::Roaming => "roaming",
            Self::HomeSmsOnly => "home-sms-only",
            Self::RoamingSmsOnly => "roaming-sms-only",
            Self::EmergencyOnly => "emergency-only",
            Self::HomeCsfbNotPreferred => "home-csfb-not-preferred",
            Self::RoamingCsfbNotPreferred => "roaming-csfb-not-preferred",
            Self::AttachedRlos => "attached-rlos",
        }
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationState {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Self::Idle,
            "home" => Self::Home,
            "searching" => Self::Searching,
            "denied" => Self::Denied,
            "unknown" => Self::Unknown,
            "roaming" => Self::Roaming,
            "home-sms-only" => Self::HomeSmsOnly,
            "roaming-sms-only" => Self::RoamingSmsOnly,
            "emergency-only" => Self::EmergencyOnly,
            "home-csfb-not-preferred" => Self::HomeCsfbNotPreferred,
            "roaming-csfb-not-preferred" => Self::RoamingCsfbNotPreferred,
            "attached-rlos" => Self::AttachedRlos,
            other => {
                return Err(ExporterError::parse_error(format!(
                    "unknown registration state '{}'",
                    other
                )))
            }
        };
        Ok(state)
    }
}

/// Radio access technology as named by the backend (e.g. "lte", "5gnr").
///
/// The backend vocabulary grows with new releases, so the name is kept
/// verbatim rather than mapped onto a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessTechnology(pub String);

impl AccessTechnology {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for AccessTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Modem power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Unknown,
    Off,
    Low,
    On,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Off => "off",
            Self::Low => "low",
            Self::On => "on",
        }
    }
}

impl FromStr for PowerState {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "off" => Ok(Self::Off),
            "low" => Ok(Self::Low),
            "on" => Ok(Self::On),
            other => Err(ExporterError::parse_error(format!(
                "unknown power state '{}'",
                other
            ))),
        }
    }
}

/// SIM card identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInfo {
    pub iccid: String,
    pub imsi: String,
    pub operator_id: String,
    pub operator_name: String,
}

/// 3GPP interface properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeGppInfo {
    pub imei: String,
    pub operator_name: String,
    /// MCC+MNC as a decimal string; empty when not registered.
    pub operator_code: String,
    /// `None` when the backend reported a value this crate does not know.
    pub registration_state: Option<RegistrationState>,
}

/// Serving-cell location, each identifier a hex string as reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub cell_id_hex: String,
    pub lac_hex: String,
    pub tac_hex: String,
}

/// Extended signal measurements for one access technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    pub technology: String,
    pub rssi: Option<f64>,
    pub rsrp: Option<f64>,
    pub rsrq: Option<f64>,
    pub snr: Option<f64>,
    pub error_rate: Option<f64>,
}

impl SignalSample {
    pub fn new(technology: impl Into<String>) -> Self {
        Self {
            technology: technology.into(),
            rssi: None,
            rsrp: None,
            rsrq: None,
            snr: None,
            error_rate: None,
        }
    }

    /// Whether the modem has populated any measurement in this sample.
    pub fn has_values(&self) -> bool {
        self.rssi.is_some()
            || self.rsrp.is_some()
            || self.rsrq.is_some()
            || self.snr.is_some()
            || self.error_rate.is_some()
    }
}

/// Coarse signal quality as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalQuality {
    pub percent: u32,
    pub recent: bool,
}

/// Traffic counters of a bearer. A counter the backend has not reported
/// yet is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerStats {
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub duration_seconds: Option<u64>,
}

/// IP configuration of one bearer address family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    pub address: String,
    pub prefix: Option<u32>,
    pub gateway: Option<String>,
    pub mtu: Option<u32>,
}

/// Static properties and status of a bearer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerProperties {
    pub interface: Option<String>,
    pub apn: Option<String>,
    pub bearer_type: Option<String>,
    pub connected: bool,
}
