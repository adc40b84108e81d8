//! In-memory ModemManager backend for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modem_exporter::error::{ExporterError, Result};
use modem_exporter::modem::types::*;
use modem_exporter::{Bearer, Exporter, ExporterConfig, Modem, ModemManager};

/// Ordered record of every mutating backend call.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.0.lock().unwrap().iter().any(|c| c == call)
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn failure(op: &str) -> ExporterError {
    ExporterError::backend_error(format!("{} failed", op))
}

pub struct FakeBearer {
    pub path: String,
    pub properties: BearerProperties,
    pub stats: BearerStats,
    pub ipv4: Option<IpConfig>,
    log: CallLog,
    fail: HashSet<&'static str>,
}

impl FakeBearer {
    pub fn new(path: &str, log: &CallLog) -> Self {
        Self {
            path: path.to_string(),
            properties: BearerProperties {
                interface: Some("wwan0".into()),
                apn: Some("internet".into()),
                bearer_type: Some("default".into()),
                connected: true,
            },
            stats: BearerStats {
                rx_bytes: Some(1024),
                tx_bytes: Some(512),
                duration_seconds: Some(60),
            },
            ipv4: Some(IpConfig {
                address: "10.64.1.2".into(),
                prefix: Some(30),
                gateway: Some("10.64.1.1".into()),
                mtu: Some(1500),
            }),
            log: log.clone(),
            fail: HashSet::new(),
        }
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail.insert(op);
        self
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.fail.contains(op) {
            Err(failure(op))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Bearer for FakeBearer {
    fn path(&self) -> &str {
        &self.path
    }

    async fn disconnect(&self) -> Result<()> {
        self.log.push(format!("disconnect {}", self.path));
        self.check("disconnect")
    }

    async fn properties(&self) -> Result<BearerProperties> {
        self.check("properties")?;
        Ok(self.properties.clone())
    }

    async fn stats(&self) -> Result<BearerStats> {
        self.check("stats")?;
        Ok(self.stats)
    }

    async fn ipv4(&self) -> Result<Option<IpConfig>> {
        self.check("ipv4")?;
        Ok(self.ipv4.clone())
    }

    async fn ipv6(&self) -> Result<Option<IpConfig>> {
        self.check("ipv6")?;
        Ok(None)
    }
}

/// A scriptable modem. Operations named in `fail` return a backend error.
pub struct FakeModem {
    pub path: String,
    state: Mutex<ModemState>,
    pub enabled_state: ModemState,
    pub sim: SimInfo,
    pub three_gpp: ThreeGppInfo,
    pub technologies: Vec<AccessTechnology>,
    pub location: LocationInfo,
    pub signals: Vec<SignalSample>,
    bearers: Mutex<Vec<Arc<dyn Bearer>>>,
    fail: HashSet<&'static str>,
    connect_delay: Option<Duration>,
    empty_signal_reads: AtomicUsize,
    /// Number of `current_signals` calls made so far.
    pub signal_reads: Arc<AtomicUsize>,
    pub log: CallLog,
}

impl FakeModem {
    /// A registered LTE modem on a home network.
    pub fn new(index: usize, log: &CallLog) -> Self {
        let mut lte = SignalSample::new("lte");
        lte.rssi = Some(-65.0);
        lte.rsrp = Some(-95.0);
        lte.rsrq = Some(-10.0);
        lte.snr = Some(12.5);

        Self {
            path: format!("/org/freedesktop/ModemManager1/Modem/{}", index),
            state: Mutex::new(ModemState::Registered),
            enabled_state: ModemState::Registered,
            sim: SimInfo {
                iccid: format!("894902200000000000{}", index),
                imsi: format!("26201000000000{}", index),
                operator_id: "26201".into(),
                operator_name: "Telekom.de".into(),
            },
            three_gpp: ThreeGppInfo {
                imei: format!("86796204123456{}", index),
                operator_name: "Telekom.de".into(),
                operator_code: "26201".into(),
                registration_state: Some(RegistrationState::Home),
            },
            technologies: vec![AccessTechnology::new("LTE")],
            location: LocationInfo {
                cell_id_hex: "01B4C209".into(),
                lac_hex: "FFFE".into(),
                tac_hex: "A1B2".into(),
            },
            signals: vec![lte],
            bearers: Mutex::new(Vec::new()),
            fail: HashSet::new(),
            connect_delay: None,
            empty_signal_reads: AtomicUsize::new(0),
            signal_reads: Arc::new(AtomicUsize::new(0)),
            log: log.clone(),
        }
    }

    pub fn with_state(self, state: ModemState) -> Self {
        *self.state.lock().unwrap() = state;
        self
    }

    /// State the modem moves to once enabled.
    pub fn with_enabled_state(mut self, state: ModemState) -> Self {
        self.enabled_state = state;
        self
    }

    pub fn with_technologies(mut self, names: &[&str]) -> Self {
        self.technologies = names.iter().map(|n| AccessTechnology::new(*n)).collect();
        self
    }

    pub fn with_signals(mut self, signals: Vec<SignalSample>) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_bearer(self, bearer: FakeBearer) -> Self {
        self.bearers.lock().unwrap().push(Arc::new(bearer));
        self
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail.insert(op);
        self
    }

    /// Make `connect` take this long before it answers.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// The first `reads` signal reads return samples without any value.
    pub fn with_empty_signal_reads(self, reads: usize) -> Self {
        self.empty_signal_reads.store(reads, Ordering::SeqCst);
        self
    }

    pub fn bearer_count(&self) -> usize {
        self.bearers.lock().unwrap().len()
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.fail.contains(op) {
            Err(failure(op))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Modem for FakeModem {
    fn path(&self) -> &str {
        &self.path
    }

    async fn state(&self) -> Result<ModemState> {
        self.check("state")?;
        Ok(*self.state.lock().unwrap())
    }

    async fn enable(&self) -> Result<()> {
        self.log.push("enable");
        self.check("enable")?;
        *self.state.lock().unwrap() = self.enabled_state;
        Ok(())
    }

    async fn state_failed_reason(&self) -> Result<String> {
        self.check("state_failed_reason")?;
        Ok(String::new())
    }

    async fn sim(&self) -> Result<SimInfo> {
        self.check("sim")?;
        Ok(self.sim.clone())
    }

    async fn three_gpp(&self) -> Result<ThreeGppInfo> {
        self.check("three_gpp")?;
        Ok(self.three_gpp.clone())
    }

    async fn access_technologies(&self) -> Result<Vec<AccessTechnology>> {
        self.check("access_technologies")?;
        Ok(self.technologies.clone())
    }

    async fn location(&self) -> Result<LocationInfo> {
        self.check("location")?;
        Ok(self.location.clone())
    }

    async fn bearers(&self) -> Result<Vec<Arc<dyn Bearer>>> {
        self.check("bearers")?;
        Ok(self.bearers.lock().unwrap().clone())
    }

    async fn delete_bearer(&self, bearer: &dyn Bearer) -> Result<()> {
        self.log.push(format!("delete {}", bearer.path()));
        self.check("delete_bearer")?;
        self.bearers.lock().unwrap().retain(|b| b.path() != bearer.path());
        Ok(())
    }

    async fn connect(&self, apn: &str) -> Result<Arc<dyn Bearer>> {
        self.log.push(format!("connect {}", apn));
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        self.check("connect")?;
        let bearer: Arc<dyn Bearer> = Arc::new(FakeBearer::new(&format!("{}/Bearer/new", self.path), &self.log));
        self.bearers.lock().unwrap().push(bearer.clone());
        Ok(bearer)
    }

    async fn setup_signal(&self, rate_seconds: u32) -> Result<()> {
        self.log.push(format!("setup_signal {}", rate_seconds));
        if rate_seconds == 0 {
            self.check("disable_signal")
        } else {
            self.check("setup_signal")
        }
    }

    async fn current_signals(&self) -> Result<Vec<SignalSample>> {
        self.signal_reads.fetch_add(1, Ordering::SeqCst);
        self.check("current_signals")?;
        let empty = self
            .empty_signal_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if empty {
            return Ok(self
                .signals
                .iter()
                .map(|s| SignalSample::new(s.technology.clone()))
                .collect());
        }
        Ok(self.signals.clone())
    }

    async fn own_numbers(&self) -> Result<Vec<String>> {
        self.check("own_numbers")?;
        Ok(vec!["+491701234567".into()])
    }

    async fn messages(&self) -> Result<Vec<String>> {
        self.check("messages")?;
        Ok(vec!["/org/freedesktop/ModemManager1/SMS/0".into()])
    }

    async fn power_state(&self) -> Result<PowerState> {
        self.check("power_state")?;
        Ok(PowerState::On)
    }

    async fn signal_quality(&self) -> Result<SignalQuality> {
        self.check("signal_quality")?;
        Ok(SignalQuality {
            percent: 75,
            recent: true,
        })
    }
}

#[derive(Default)]
pub struct FakeManager {
    pub modems: Vec<Arc<FakeModem>>,
    pub fail_listing: bool,
}

impl FakeManager {
    pub fn new(modems: Vec<FakeModem>) -> Self {
        Self {
            modems: modems.into_iter().map(Arc::new).collect(),
            fail_listing: false,
        }
    }

    pub fn failing_listing() -> Self {
        Self {
            modems: Vec::new(),
            fail_listing: true,
        }
    }
}

#[async_trait]
impl ModemManager for FakeManager {
    async fn version(&self) -> Result<String> {
        Ok("1.22.0".into())
    }

    async fn set_logging(&self, _level: &str) -> Result<()> {
        Ok(())
    }

    async fn list_modems(&self) -> Result<Vec<Arc<dyn Modem>>> {
        if self.fail_listing {
            return Err(failure("list_modems"));
        }
        Ok(self
            .modems
            .iter()
            .map(|m| m.clone() as Arc<dyn Modem>)
            .collect())
    }
}

pub fn exporter(manager: FakeManager, config: ExporterConfig) -> Exporter {
    Exporter::new(Arc::new(manager), config).unwrap()
}
