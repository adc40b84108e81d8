//! Push-model emitter rendering InfluxDB line protocol.
//!
//! Each record is `measurement,tag=value,... field=value,... timestamp`.
//! Every record written for one modem shares a single nanosecond
//! timestamp. Absent values are left out of the record; a record with no
//! field left is not written at all.

use std::fmt::Write;

use crate::metrics::data::{BearerSnapshot, CollectedModem};
use crate::modem::types::IpConfig;

/// Content type of the rendered records.
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
    Int(i64),
    /// Only used for values past the signed range.
    UInt(u64),
    Float(f64),
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map(Self::Int).unwrap_or(Self::UInt(v))
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        Self::from(v as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// One line-protocol record under construction.
#[derive(Debug, Clone)]
pub struct Record {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add a tag. Empty values are dropped: line protocol has no empty tags.
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.tags.push((key.to_string(), value.to_string()));
        }
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        if let FieldValue::Float(f) = value {
            if !f.is_finite() {
                return self;
            }
        }
        self.fields.push((key.to_string(), value));
        self
    }

    /// Add a field only when a value is present.
    pub fn field_opt<V: Into<FieldValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Append the record as one line. Records without fields are skipped.
    pub fn write_to(&self, out: &mut String, timestamp_ns: i64) {
        if !self.has_fields() {
            return;
        }

        out.push_str(&escape(&self.measurement, &[',', ' ']));
        for (key, value) in &self.tags {
            let _ = write!(out, ",{}={}", escape_key(key), escape_key(value));
        }
        for (i, (key, value)) in self.fields.iter().enumerate() {
            out.push(if i == 0 { ' ' } else { ',' });
            let _ = write!(out, "{}=", escape_key(key));
            match value {
                FieldValue::Str(s) => {
                    let _ = write!(out, "\"{}\"", escape(s, &['"', '\\']));
                }
                FieldValue::Bool(b) => {
                    let _ = write!(out, "{}", b);
                }
                FieldValue::Int(n) => {
                    let _ = write!(out, "{}i", n);
                }
                FieldValue::UInt(n) => {
                    let _ = write!(out, "{}u", n);
                }
                FieldValue::Float(f) => {
                    let _ = write!(out, "{}", f);
                }
            }
        }
        let _ = writeln!(out, " {}", timestamp_ns);
    }
}

/// Backslash-escape `special`. Line breaks end a record, so they become
/// spaces wherever they appear.
fn escape(raw: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c == '\n' || c == '\r' { ' ' } else { c };
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn escape_key(raw: &str) -> String {
    escape(raw, &[',', '=', ' '])
}

/// Renders collected modems as line-protocol records.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushEmitter;

impl PushEmitter {
    pub fn new() -> Self {
        Self
    }

    /// Append every record of one modem, all stamped with the modem's
    /// collection timestamp.
    pub fn emit_modem(&self, out: &mut String, modem: &CollectedModem) {
        let timestamp_ns = modem.timestamp_ns;
        self.status(modem).write_to(out, timestamp_ns);

        if let Some(samples) = &modem.snapshot.signal {
            for sample in samples {
                self.identity_record("modem_signal", modem)
                    .tag("type", &sample.technology)
                    .field_opt("rssi", sample.rssi)
                    .field_opt("rsrp", sample.rsrp)
                    .field_opt("rsrq", sample.rsrq)
                    .field_opt("snr", sample.snr)
                    .field_opt("error_rate", sample.error_rate)
                    .write_to(out, timestamp_ns);
            }
        }

        if let Some(bearers) = &modem.snapshot.bearers {
            for bearer in bearers {
                self.bearer(modem, bearer).write_to(out, timestamp_ns);
                for (family, config) in [("ipv4", &bearer.ipv4), ("ipv6", &bearer.ipv6)] {
                    if let Some(config) = config {
                        self.bearer_ip(modem, bearer, family, config)
                            .write_to(out, timestamp_ns);
                    }
                }
            }
        }
    }

    fn identity_record(&self, measurement: &str, modem: &CollectedModem) -> Record {
        modem
            .identity
            .labels()
            .fold(Record::new(measurement), |record, (key, value)| record.tag(key, value))
    }

    fn status(&self, modem: &CollectedModem) -> Record {
        let snapshot = &modem.snapshot;
        let derived = &modem.derived;
        let location = snapshot.location.as_ref();
        let hex = |raw: &str| (!raw.is_empty()).then(|| raw.to_string());

        self.identity_record("modem_status", modem)
            .field("up", true)
            .field_opt("state", snapshot.state.map(|s| s.as_str()))
            .field_opt("registered", derived.registered)
            .field_opt("connected", derived.connected)
            .field_opt(
                "failed_reason",
                snapshot.state_failed_reason.clone().filter(|r| !r.is_empty()),
            )
            .field_opt("regstate", snapshot.registration_state.map(|r| r.as_str()))
            .field_opt("roaming", derived.roaming)
            .field_opt("operatorcode", derived.operator_code)
            .field_opt("cellid", derived.cell_id)
            .field_opt("lac", derived.lac)
            .field_opt("tac", derived.tac)
            .field_opt("cellid_hex", location.and_then(|l| hex(&l.cell_id_hex)))
            .field_opt("lac_hex", location.and_then(|l| hex(&l.lac_hex)))
            .field_opt("tac_hex", location.and_then(|l| hex(&l.tac_hex)))
            .field_opt("power_state", snapshot.power_state.map(|p| p.as_str()))
            .field_opt("signal_quality", snapshot.signal_quality.map(|q| q.percent))
            .field_opt("signal_recent", snapshot.signal_quality.map(|q| q.recent))
            .field_opt(
                "own_numbers",
                snapshot
                    .own_numbers
                    .as_ref()
                    .filter(|numbers| !numbers.is_empty())
                    .map(|numbers| numbers.join(",")),
            )
            .field_opt("messages", snapshot.message_count)
    }

    fn bearer(&self, modem: &CollectedModem, bearer: &BearerSnapshot) -> Record {
        let properties = bearer.properties.as_ref();
        let stats = bearer.stats.as_ref();
        let tag = |value: Option<&String>| value.map(String::as_str).unwrap_or_default().to_string();

        self.identity_record("modem_bearer", modem)
            .tag("bearer", bearer.id())
            .tag("interface", &tag(properties.and_then(|p| p.interface.as_ref())))
            .tag("apn", &tag(properties.and_then(|p| p.apn.as_ref())))
            .tag("bearer_type", &tag(properties.and_then(|p| p.bearer_type.as_ref())))
            .field_opt("connected", properties.map(|p| p.connected))
            .field_opt("rx_bytes", stats.and_then(|s| s.rx_bytes))
            .field_opt("tx_bytes", stats.and_then(|s| s.tx_bytes))
            .field_opt("duration", stats.and_then(|s| s.duration_seconds))
    }

    fn bearer_ip(
        &self,
        modem: &CollectedModem,
        bearer: &BearerSnapshot,
        family: &str,
        config: &IpConfig,
    ) -> Record {
        self.identity_record("modem_bearer_ip", modem)
            .tag("bearer", bearer.id())
            .tag("family", family)
            .field("address", config.address.as_str())
            .field_opt("prefix", config.prefix)
            .field_opt("gateway", config.gateway.clone())
            .field_opt("mtu", config.mtu)
    }
}
