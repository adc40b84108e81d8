//! Pull-model emitter for the Prometheus endpoint.
//!
//! Metric descriptors live for the whole process in one registry. Each
//! scrape resets every vector, writes the samples of the current pass and
//! renders the registry, so label sets of modems that disappeared do not
//! linger between scrapes.
//!
//! Labels include the free-form operator names. A modem that hops between
//! networks therefore produces a new series per operator name.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::metrics::data::{CollectedModem, IDENTITY_LABELS};
use crate::modem::types::SignalSample;

const NAMESPACE: &str = "modem";

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Registry-backed Prometheus emitter.
pub struct PullEmitter {
    registry: Registry,
    up: GaugeVec,
    registered: GaugeVec,
    connected: GaugeVec,
    roaming: GaugeVec,
    operator_code: GaugeVec,
    cell_id: GaugeVec,
    lac: GaugeVec,
    tac: GaugeVec,
    rssi: GaugeVec,
    rsrp: GaugeVec,
}

impl PullEmitter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let gauge = |name: &str, help: &str, labels: &[&str]| -> Result<GaugeVec> {
            let vec = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        let up = gauge("up", "Was the last modem query successful", &[])?;
        let registered = gauge("registered", "Is the modem registered", &IDENTITY_LABELS)?;
        let connected = gauge("connected", "Is the modem connected", &IDENTITY_LABELS)?;
        let roaming = gauge("roaming", "Is the modem roaming", &IDENTITY_LABELS)?;
        let operator_code = gauge(
            "operatorcode",
            "Code of the operator currently used by the modem",
            &IDENTITY_LABELS,
        )?;
        let cell_id = gauge("cellid", "CellID currently used by the modem", &IDENTITY_LABELS)?;
        let lac = gauge("lac", "LAC currently used by the modem", &IDENTITY_LABELS)?;
        let tac = gauge("tac", "TAC currently used by the modem", &IDENTITY_LABELS)?;
        let rssi = gauge("rssi", "Received signal strength reported by the modem", &IDENTITY_LABELS)?;
        let rsrp = gauge("rsrp", "Reference signal received power reported by the modem", &IDENTITY_LABELS)?;

        Ok(Self {
            registry,
            up,
            registered,
            connected,
            roaming,
            operator_code,
            cell_id,
            lac,
            tac,
            rssi,
            rsrp,
        })
    }

    /// Forget every sample of the previous pass.
    pub fn reset(&self) {
        for vec in self.vectors() {
            vec.reset();
        }
    }

    /// Record that the modem list could be retrieved.
    pub fn emit_up(&self) {
        self.up.with_label_values(&[]).set(1.0);
    }

    /// Record every available value of one modem.
    pub fn emit_modem(&self, modem: &CollectedModem) {
        let labels = modem.identity.label_values();
        let derived = &modem.derived;
        let set = |vec: &GaugeVec, value: f64| vec.with_label_values(&labels).set(value);

        if let Some(registered) = derived.registered {
            set(&self.registered, bool_value(registered));
        }
        if let Some(connected) = derived.connected {
            set(&self.connected, bool_value(connected));
        }
        if let Some(roaming) = derived.roaming {
            set(&self.roaming, bool_value(roaming));
        }
        if let Some(code) = derived.operator_code {
            set(&self.operator_code, code as f64);
        }
        if let Some(cell_id) = derived.cell_id {
            set(&self.cell_id, cell_id as f64);
        }
        if let Some(lac) = derived.lac {
            set(&self.lac, lac as f64);
        }
        if let Some(tac) = derived.tac {
            set(&self.tac, tac as f64);
        }

        // One series per label set: the first technology reporting a value wins.
        if let Some(samples) = &modem.snapshot.signal {
            if let Some(rssi) = first_value(samples, |s| s.rssi) {
                set(&self.rssi, rssi);
            }
            if let Some(rsrp) = first_value(samples, |s| s.rsrp) {
                set(&self.rsrp, rsrp);
            }
        }
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn vectors(&self) -> [&GaugeVec; 10] {
        [
            &self.up,
            &self.registered,
            &self.connected,
            &self.roaming,
            &self.operator_code,
            &self.cell_id,
            &self.lac,
            &self.tac,
            &self.rssi,
            &self.rsrp,
        ]
    }
}

fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn first_value(samples: &[SignalSample], pick: impl Fn(&SignalSample) -> Option<f64>) -> Option<f64> {
    samples.iter().filter_map(pick).find(|v| v.is_finite())
}
