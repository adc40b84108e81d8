//! Data structures for one collection pass over a modem.

use serde::{Deserialize, Serialize};

use crate::modem::types::*;

/// Label names attached to every per-modem metric, in label order.
pub const IDENTITY_LABELS: [&str; 7] = [
    "imei",
    "icc",
    "imsi",
    "operatorid",
    "operator",
    "v_operator",
    "rat",
];

/// The identifying tuple of a modem.
///
/// Every value must be resolved before anything is emitted for the modem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemIdentity {
    pub imei: String,
    pub icc: String,
    pub imsi: String,
    /// Operator identifier (MCC+MNC) stored on the SIM
    pub sim_operator_id: String,
    /// Operator name stored on the SIM
    pub sim_operator_name: String,
    /// Name of the network the modem is attached to
    pub network_operator_name: String,
    /// Lowercased radio access technology, empty when unknown
    pub rat: String,
}

impl ModemIdentity {
    /// Label values in [`IDENTITY_LABELS`] order.
    pub fn label_values(&self) -> [&str; 7] {
        [
            self.imei.as_str(),
            self.icc.as_str(),
            self.imsi.as_str(),
            self.sim_operator_id.as_str(),
            self.sim_operator_name.as_str(),
            self.network_operator_name.as_str(),
            self.rat.as_str(),
        ]
    }

    /// Label names paired with their values.
    pub fn labels(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        IDENTITY_LABELS.into_iter().zip(self.label_values())
    }
}

/// A best-effort, point-in-time view of a modem.
///
/// Every field is independently present or absent. A `None` means the
/// read failed or was never attempted, and must never be reported as a
/// zero or an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModemSnapshot {
    /// Backend object path of the modem
    pub path: String,
    /// Operational state, from the read taken after identity resolution
    pub state: Option<ModemState>,
    pub state_failed_reason: Option<String>,
    pub registration_state: Option<RegistrationState>,
    pub location: Option<LocationInfo>,
    /// Operator code as reported, possibly empty
    pub operator_code: Option<String>,
    /// Signal samples, one per technology that reported values
    pub signal: Option<Vec<SignalSample>>,
    pub bearers: Option<Vec<BearerSnapshot>>,
    pub message_count: Option<usize>,
    pub power_state: Option<PowerState>,
    pub signal_quality: Option<SignalQuality>,
    pub own_numbers: Option<Vec<String>>,
}

impl ModemSnapshot {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// What could be read about one bearer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerSnapshot {
    pub path: String,
    pub properties: Option<BearerProperties>,
    pub stats: Option<BearerStats>,
    pub ipv4: Option<IpConfig>,
    pub ipv6: Option<IpConfig>,
}

impl BearerSnapshot {
    /// Short bearer identifier: the last segment of the object path.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Values computed from a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub registered: Option<bool>,
    pub connected: Option<bool>,
    pub roaming: Option<bool>,
    pub cell_id: Option<u64>,
    pub lac: Option<u64>,
    pub tac: Option<u64>,
    pub operator_code: Option<u64>,
}

/// Everything the emitters need about one modem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedModem {
    pub identity: ModemIdentity,
    pub snapshot: ModemSnapshot,
    pub derived: DerivedFields,
    /// Nanoseconds since the Unix epoch when the snapshot was completed
    pub timestamp_ns: i64,
}
