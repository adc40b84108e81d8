//! ModemManager backend driven through the `mmcli` command-line client.
//!
//! Every call spawns `mmcli` with `-J` and decodes its JSON output. mmcli
//! prints `--` for properties that are not set; those decode as absent.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ExporterError, Result};
use crate::modem::traits::{Bearer, Modem, ModemManager};
use crate::modem::types::*;

/// Runs `mmcli` as a child process.
#[derive(Debug, Clone)]
pub struct Mmcli {
    binary: String,
}

impl Mmcli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!(binary = %self.binary, ?args, "invoking mmcli");
        let output = Command::new(&self.binary).args(args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExporterError::backend_error(format!(
                "mmcli {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let mut full = args.to_vec();
        full.push("-J");
        let stdout = self.run(&full).await?;
        Ok(serde_json::from_str(&stdout)?)
    }
}

/// [`ModemManager`] implementation on top of [`Mmcli`].
#[derive(Debug, Clone)]
pub struct MmcliManager {
    mmcli: Arc<Mmcli>,
}

impl MmcliManager {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            mmcli: Arc::new(Mmcli::new(binary)),
        }
    }

    /// The mmcli binary every call is made with.
    pub fn binary(&self) -> &str {
        &self.mmcli.binary
    }
}

#[async_trait]
impl ModemManager for MmcliManager {
    async fn version(&self) -> Result<String> {
        let stdout = self.mmcli.run(&["--version"]).await?;
        parse_version(&stdout)
    }

    async fn set_logging(&self, level: &str) -> Result<()> {
        let arg = format!("--set-logging={}", level);
        self.mmcli.run(&[arg.as_str()]).await.map(|_| ())
    }

    async fn list_modems(&self) -> Result<Vec<Arc<dyn Modem>>> {
        let list: json::ModemList = self.mmcli.json(&["-L"]).await?;
        Ok(list
            .modem_list
            .into_iter()
            .map(|path| {
                Arc::new(MmcliModem {
                    mmcli: self.mmcli.clone(),
                    path,
                }) as Arc<dyn Modem>
            })
            .collect())
    }
}

/// A modem addressed by its D-Bus object path.
#[derive(Debug, Clone)]
pub struct MmcliModem {
    mmcli: Arc<Mmcli>,
    path: String,
}

impl MmcliModem {
    async fn info(&self) -> Result<json::ModemInfo> {
        let doc: json::ModemDoc = self.mmcli.json(&["-m", self.path.as_str()]).await?;
        Ok(doc.modem)
    }

    fn bearer(&self, path: String) -> Arc<dyn Bearer> {
        Arc::new(MmcliBearer {
            mmcli: self.mmcli.clone(),
            path,
        })
    }
}

#[async_trait]
impl Modem for MmcliModem {
    fn path(&self) -> &str {
        &self.path
    }

    async fn state(&self) -> Result<ModemState> {
        let info = self.info().await?;
        info.generic.state.parse()
    }

    async fn enable(&self) -> Result<()> {
        self.mmcli.run(&["-m", self.path.as_str(), "--enable"]).await.map(|_| ())
    }

    async fn state_failed_reason(&self) -> Result<String> {
        let info = self.info().await?;
        Ok(present(&info.generic.state_failed_reason)
            .unwrap_or_default()
            .to_string())
    }

    async fn sim(&self) -> Result<SimInfo> {
        let info = self.info().await?;
        let sim_path = present(&info.generic.sim)
            .ok_or_else(|| ExporterError::backend_error("modem has no SIM"))?;
        let doc: json::SimDoc = self.mmcli.json(&["-i", sim_path]).await?;
        Ok(doc.sim.properties.into())
    }

    async fn three_gpp(&self) -> Result<ThreeGppInfo> {
        let info = self.info().await?;
        Ok(info.three_gpp.into())
    }

    async fn access_technologies(&self) -> Result<Vec<AccessTechnology>> {
        let info = self.info().await?;
        Ok(info
            .generic
            .access_technologies
            .iter()
            .filter_map(|t| present(t))
            .map(AccessTechnology::new)
            .collect())
    }

    async fn location(&self) -> Result<LocationInfo> {
        let doc: json::LocationDoc = self
            .mmcli
            .json(&["-m", self.path.as_str(), "--location-get"])
            .await?;
        Ok(doc.modem.location.three_gpp.into())
    }

    async fn bearers(&self) -> Result<Vec<Arc<dyn Bearer>>> {
        let info = self.info().await?;
        Ok(info
            .generic
            .bearers
            .into_iter()
            .map(|path| self.bearer(path))
            .collect())
    }

    async fn delete_bearer(&self, bearer: &dyn Bearer) -> Result<()> {
        let arg = format!("--delete-bearer={}", bearer.path());
        self.mmcli
            .run(&["-m", self.path.as_str(), arg.as_str()])
            .await
            .map(|_| ())
    }

    async fn connect(&self, apn: &str) -> Result<Arc<dyn Bearer>> {
        let arg = format!("--simple-connect=apn={}", apn);
        self.mmcli.run(&["-m", self.path.as_str(), arg.as_str()]).await?;

        // mmcli does not print the new bearer; the most recent one is it.
        let info = self.info().await?;
        info.generic
            .bearers
            .into_iter()
            .last()
            .map(|path| self.bearer(path))
            .ok_or_else(|| {
                ExporterError::backend_error("connect succeeded but no bearer was reported")
            })
    }

    async fn setup_signal(&self, rate_seconds: u32) -> Result<()> {
        let arg = format!("--signal-setup={}", rate_seconds);
        self.mmcli
            .run(&["-m", self.path.as_str(), arg.as_str()])
            .await
            .map(|_| ())
    }

    async fn current_signals(&self) -> Result<Vec<SignalSample>> {
        let doc: json::SignalDoc = self
            .mmcli
            .json(&["-m", self.path.as_str(), "--signal-get"])
            .await?;
        Ok(signal_samples(doc.modem.signal))
    }

    async fn own_numbers(&self) -> Result<Vec<String>> {
        let info = self.info().await?;
        Ok(info
            .generic
            .own_numbers
            .iter()
            .filter_map(|n| present(n))
            .map(str::to_string)
            .collect())
    }

    async fn messages(&self) -> Result<Vec<String>> {
        let doc: json::SmsList = self
            .mmcli
            .json(&["-m", self.path.as_str(), "--messaging-list-sms"])
            .await?;
        Ok(doc.sms)
    }

    async fn power_state(&self) -> Result<PowerState> {
        let info = self.info().await?;
        info.generic.power_state.parse()
    }

    async fn signal_quality(&self) -> Result<SignalQuality> {
        let info = self.info().await?;
        let quality = info.generic.signal_quality;
        let percent = quality.value.trim().parse::<u32>().map_err(|e| {
            ExporterError::parse_error(format!("signal quality '{}': {}", quality.value, e))
        })?;
        Ok(SignalQuality {
            percent,
            recent: quality.recent == "yes",
        })
    }
}

/// A bearer addressed by its D-Bus object path.
#[derive(Debug, Clone)]
pub struct MmcliBearer {
    mmcli: Arc<Mmcli>,
    path: String,
}

impl MmcliBearer {
    async fn info(&self) -> Result<json::BearerInfo> {
        let doc: json::BearerDoc = self.mmcli.json(&["-b", self.path.as_str()]).await?;
        Ok(doc.bearer)
    }
}

#[async_trait]
impl Bearer for MmcliBearer {
    fn path(&self) -> &str {
        &self.path
    }

    async fn disconnect(&self) -> Result<()> {
        self.mmcli
            .run(&["-b", self.path.as_str(), "--disconnect"])
            .await
            .map(|_| ())
    }

    async fn properties(&self) -> Result<BearerProperties> {
        let info = self.info().await?;
        Ok(BearerProperties {
            interface: present(&info.status.interface).map(str::to_string),
            apn: present(&info.properties.apn).map(str::to_string),
            bearer_type: present(&info.bearer_type).map(str::to_string),
            connected: info.status.connected == "yes",
        })
    }

    async fn stats(&self) -> Result<BearerStats> {
        let stats = self.info().await?.stats;
        Ok(BearerStats {
            rx_bytes: parse_counter("bytes-rx", &stats.bytes_rx)?,
            tx_bytes: parse_counter("bytes-tx", &stats.bytes_tx)?,
            duration_seconds: parse_counter("duration", &stats.duration)?,
        })
    }

    async fn ipv4(&self) -> Result<Option<IpConfig>> {
        Ok(self.info().await?.ipv4_config.into_config())
    }

    async fn ipv6(&self) -> Result<Option<IpConfig>> {
        Ok(self.info().await?.ipv6_config.into_config())
    }
}

/// Treat mmcli's `--` placeholder and empty strings as absent.
fn present(value: &str) -> Option<&str> {
    match value.trim() {
        "" | "--" => None,
        v => Some(v),
    }
}

fn present_owned(value: String) -> String {
    present(&value).unwrap_or_default().to_string()
}

/// mmcli leaves counters as `--` until it has a value for them.
fn parse_counter(name: &str, value: &str) -> Result<Option<u64>> {
    present(value)
        .map(|v| {
            v.parse()
                .map_err(|e| ExporterError::parse_error(format!("bearer {} '{}': {}", name, v, e)))
        })
        .transpose()
}

fn parse_version(stdout: &str) -> Result<String> {
    stdout
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .ok_or_else(|| ExporterError::parse_error(format!("unexpected version output: {}", stdout)))
}

fn signal_samples(signal: BTreeMap<String, BTreeMap<String, String>>) -> Vec<SignalSample> {
    signal
        .into_iter()
        .filter(|(technology, _)| technology != "refresh" && technology != "threshold")
        .map(|(technology, values)| {
            let read = |key: &str| {
                values
                    .get(key)
                    .and_then(|v| present(v))
                    .and_then(|v| v.parse::<f64>().ok())
            };
            SignalSample {
                rssi: read("rssi"),
                rsrp: read("rsrp"),
                rsrq: read("rsrq"),
                snr: read("snr"),
                error_rate: read("error-rate"),
                technology,
            }
        })
        .filter(SignalSample::has_values)
        .collect()
}

/// Shapes of the mmcli JSON documents this backend reads.
mod json {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub struct ModemList {
        #[serde(rename = "modem-list", default)]
        pub modem_list: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ModemDoc {
        pub modem: ModemInfo,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct ModemInfo {
        #[serde(rename = "3gpp", default)]
        pub three_gpp: ThreeGpp,
        #[serde(default)]
        pub generic: Generic,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "kebab-case")]
    pub struct ThreeGpp {
        pub imei: String,
        pub operator_code: String,
        pub operator_name: String,
        pub registration_state: String,
    }

    impl From<ThreeGpp> for ThreeGppInfo {
        fn from(raw: ThreeGpp) -> Self {
            ThreeGppInfo {
                registration_state: raw.registration_state.parse().ok(),
                imei: present_owned(raw.imei),
                operator_name: present_owned(raw.operator_name),
                operator_code: present_owned(raw.operator_code),
            }
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "kebab-case")]
    pub struct Generic {
        pub access_technologies: Vec<String>,
        pub bearers: Vec<String>,
        pub own_numbers: Vec<String>,
        pub power_state: String,
        pub signal_quality: Quality,
        pub sim: String,
        pub state: String,
        pub state_failed_reason: String,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Quality {
        pub recent: String,
        pub value: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct SimDoc {
        pub sim: Sim,
    }

    #[derive(Debug, Deserialize)]
    pub struct Sim {
        #[serde(default)]
        pub properties: SimProperties,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "kebab-case")]
    pub struct SimProperties {
        pub iccid: String,
        pub imsi: String,
        #[serde(alias = "operator-id")]
        pub operator_code: String,
        pub operator_name: String,
    }

    impl From<SimProperties> for SimInfo {
        fn from(raw: SimProperties) -> Self {
            SimInfo {
                iccid: present_owned(raw.iccid),
                imsi: present_owned(raw.imsi),
                operator_id: present_owned(raw.operator_code),
                operator_name: present_owned(raw.operator_name),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct LocationDoc {
        pub modem: LocationModem,
    }

    #[derive(Debug, Deserialize)]
    pub struct LocationModem {
        #[serde(default)]
        pub location: Location,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Location {
        #[serde(rename = "3gpp", default)]
        pub three_gpp: Location3gpp,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Location3gpp {
        pub cid: String,
        pub lac: String,
        pub tac: String,
    }

    impl From<Location3gpp> for LocationInfo {
        fn from(raw: Location3gpp) -> Self {
            LocationInfo {
                cell_id_hex: present_owned(raw.cid),
                lac_hex: present_owned(raw.lac),
                tac_hex: present_owned(raw.tac),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct SignalDoc {
        pub modem: SignalModem,
    }

    #[derive(Debug, Deserialize)]
    pub struct SignalModem {
        #[serde(default)]
        pub signal: BTreeMap<String, BTreeMap<String, String>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct SmsList {
        #[serde(rename = "modem.messaging.sms", default)]
        pub sms: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct BearerDoc {
        pub bearer: BearerInfo,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "kebab-case")]
    pub struct BearerInfo {
        pub ipv4_config: IpBlock,
        pub ipv6_config: IpBlock,
        pub properties: BearerProps,
        pub stats: Stats,
        pub status: Status,
        #[serde(rename = "type")]
        pub bearer_type: String,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct IpBlock {
        pub address: String,
        pub prefix: String,
        pub gateway: String,
        pub mtu: String,
    }

    impl IpBlock {
        pub fn into_config(self) -> Option<IpConfig> {
            let address = present(&self.address)?.to_string();
            Some(IpConfig {
                address,
                prefix: present(&self.prefix).and_then(|p| p.parse().ok()),
                gateway: present(&self.gateway).map(str::to_string),
                mtu: present(&self.mtu).and_then(|m| m.parse().ok()),
            })
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct BearerProps {
        pub apn: String,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "kebab-case")]
    pub struct Stats {
        pub bytes_rx: String,
        pub bytes_tx: String,
        pub duration: String,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Status {
        pub connected: String,
        pub interface: String,
    }
}
