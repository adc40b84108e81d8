//! Per-modem snapshot collection.
//!
//! A [`SnapshotReader`] walks one modem through a fixed sequence of
//! backend reads. Identity is resolved first and is mandatory; every
//! field after it is best-effort, with the [`FieldPolicy`] of the active
//! [`PipelineProfile`] deciding whether a failed field is skipped or ends
//! the modem's collection.

use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::{ExporterError, Result};
use crate::metrics::data::{BearerSnapshot, ModemIdentity, ModemSnapshot};
use crate::metrics::derive::{normalize_rat, RatPolicy, RegisteredRule};
use crate::modem::traits::Modem;
use crate::modem::types::{ModemState, SignalSample};

/// Refresh rate requested while extended signal reporting is on.
pub const SIGNAL_REFRESH_SECONDS: u32 = 1;

/// What to do when an optional field cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Stop reading the modem; fields read so far are still reported.
    AbortModem,
    /// Leave the field absent and carry on with the next one.
    SkipField,
}

/// How long to let the modem populate fresh signal measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStrategy {
    /// Sleep once, then read.
    Fixed(Duration),
    /// Sleep `interval` and read, repeating until some technology reports
    /// a value or `max` has elapsed.
    Poll { interval: Duration, max: Duration },
}

/// Collection behaviour of one emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineProfile {
    pub field_policy: FieldPolicy,
    pub rat_policy: RatPolicy,
    pub registered_rule: RegisteredRule,
    pub settle: SettleStrategy,
    /// Also read power, signal quality, numbers, messages and bearers.
    pub extended: bool,
}

impl PipelineProfile {
    /// Profile of the Prometheus endpoint.
    pub fn pull() -> Self {
        Self {
            field_policy: FieldPolicy::AbortModem,
            rat_policy: RatPolicy::ExactlyOne,
            registered_rule: RegisteredRule::RegisteredOrConnected,
            settle: SettleStrategy::Fixed(Duration::from_secs(2)),
            extended: false,
        }
    }

    /// Profile of the line-protocol endpoint.
    pub fn push() -> Self {
        Self {
            field_policy: FieldPolicy::SkipField,
            rat_policy: RatPolicy::FirstWins,
            registered_rule: RegisteredRule::AtLeastRegistered,
            settle: SettleStrategy::Poll {
                interval: Duration::from_millis(400),
                max: Duration::from_secs(2),
            },
            extended: true,
        }
    }
}

/// Marker for "stop reading this modem" under [`FieldPolicy::AbortModem`].
struct Aborted;

/// Reads identity and snapshot of a single modem.
pub struct SnapshotReader<'a> {
    profile: &'a PipelineProfile,
}

impl<'a> SnapshotReader<'a> {
    pub fn new(profile: &'a PipelineProfile) -> Self {
        Self { profile }
    }

    /// Resolve the modem's identity and read a best-effort snapshot.
    ///
    /// Errors only when the modem has to be skipped entirely: it is
    /// disabled and cannot be enabled, or its identity is incomplete.
    pub async fn read(&self, modem: &Arc<dyn Modem>) -> Result<(ModemIdentity, ModemSnapshot)> {
        let path = modem.path();

        self.ensure_enabled(modem.as_ref()).await?;
        let identity = self.read_identity(modem.as_ref()).await?;

        let mut snapshot = ModemSnapshot::new(path);

        // The enable attempt above may have moved the state machine.
        match modem.state().await {
            Ok(state) => snapshot.state = Some(state),
            Err(e) => match self.profile.field_policy {
                FieldPolicy::AbortModem => {
                    return Err(ExporterError::backend_error(format!(
                        "{}: cannot get modem state: {}",
                        path, e
                    )))
                }
                FieldPolicy::SkipField => {
                    warn!(modem = path, error = %e, "cannot get modem state");
                }
            },
        }

        if self.read_fields(modem, &mut snapshot).await.is_err() {
            info!(modem = path, "skipping remaining fields");
        }

        Ok((identity, snapshot))
    }

    async fn ensure_enabled(&self, modem: &dyn Modem) -> Result<()> {
        let path = modem.path();
        let state = match modem.state().await {
            Ok(state) => state,
            Err(e) if self.profile.field_policy == FieldPolicy::SkipField => {
                warn!(modem = path, error = %e, "cannot get modem state");
                return Ok(());
            }
            Err(e) => {
                return Err(ExporterError::backend_error(format!(
                    "{}: cannot get modem state: {}",
                    path, e
                )))
            }
        };

        if state == ModemState::Disabled {
            info!(modem = path, "modem disabled, trying to enable it");
            modem
                .enable()
                .await
                .map_err(|e| ExporterError::disabled_error(format!("{}: {}", path, e)))?;
        }
        Ok(())
    }

    async fn read_identity(&self, modem: &dyn Modem) -> Result<ModemIdentity> {
        let path = modem.path();
        let identity_error =
            |what: &str, e: ExporterError| ExporterError::identity_error(format!("{}: {}: {}", path, what, e));

        let sim = modem.sim().await.map_err(|e| identity_error("sim", e))?;
        let three_gpp = modem
            .three_gpp()
            .await
            .map_err(|e| identity_error("3gpp", e))?;

        let rat = match modem.access_technologies().await {
            Ok(technologies) => normalize_rat(path, &technologies, self.profile.rat_policy)?,
            Err(e) => match self.profile.rat_policy {
                RatPolicy::ExactlyOne => return Err(identity_error("access technologies", e)),
                RatPolicy::FirstWins => {
                    warn!(modem = path, error = %e, "cannot get access technologies");
                    String::new()
                }
            },
        };

        Ok(ModemIdentity {
            imei: three_gpp.imei,
            icc: sim.iccid,
            imsi: sim.imsi,
            sim_operator_id: sim.operator_id,
            sim_operator_name: sim.operator_name,
            network_operator_name: three_gpp.operator_name,
            rat,
        })
    }

    async fn read_fields(
        &self,
        modem: &Arc<dyn Modem>,
        snapshot: &mut ModemSnapshot,
    ) -> std::result::Result<(), Aborted> {
        let path = modem.path();

        snapshot.state_failed_reason =
            self.field(path, "state failed reason", modem.state_failed_reason().await)?;
        snapshot.location = self.field(path, "location", modem.location().await)?;

        if let Some(three_gpp) = self.field(path, "3gpp", modem.three_gpp().await)? {
            if three_gpp.registration_state.is_none() {
                warn!(modem = path, "unknown registration state");
            }
            snapshot.registration_state = three_gpp.registration_state;
            snapshot.operator_code = Some(three_gpp.operator_code);
        }

        snapshot.signal = self.field(path, "signal", self.acquire_signal(modem).await)?;

        if self.profile.extended {
            snapshot.power_state = self.field(path, "power state", modem.power_state().await)?;
            snapshot.signal_quality =
                self.field(path, "signal quality", modem.signal_quality().await)?;
            snapshot.own_numbers = self.field(path, "own numbers", modem.own_numbers().await)?;
            snapshot.message_count = self
                .field(path, "messages", modem.messages().await)?
                .map(|messages| messages.len());
            snapshot.bearers = self.field(path, "bearers", read_bearers(modem.as_ref()).await)?;
        }

        Ok(())
    }

    fn field<T>(
        &self,
        modem: &str,
        field: &'static str,
        result: Result<T>,
    ) -> std::result::Result<Option<T>, Aborted> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(modem, field, error = %e, "cannot read modem field");
                match self.profile.field_policy {
                    FieldPolicy::AbortModem => Err(Aborted),
                    FieldPolicy::SkipField => Ok(None),
                }
            }
        }
    }

    /// Enable extended signal reporting, wait for fresh measurements, read
    /// them and disable reporting again.
    async fn acquire_signal(&self, modem: &Arc<dyn Modem>) -> Result<Vec<SignalSample>> {
        modem.setup_signal(SIGNAL_REFRESH_SECONDS).await?;
        let guard = SignalReportingGuard::new(modem.clone());

        let samples = self.settle_and_read(modem.as_ref()).await;

        guard.release().await;
        samples
    }

    async fn settle_and_read(&self, modem: &dyn Modem) -> Result<Vec<SignalSample>> {
        match self.profile.settle {
            SettleStrategy::Fixed(delay) => {
                time::sleep(delay).await;
                modem.current_signals().await
            }
            SettleStrategy::Poll { interval, max } => {
                let mut waited = Duration::ZERO;
                loop {
                    time::sleep(interval).await;
                    waited += interval;
                    let samples = modem.current_signals().await?;
                    if samples.iter().any(SignalSample::has_values) || waited >= max {
                        debug!(modem = modem.path(), ?waited, "signal measurements settled");
                        return Ok(samples);
                    }
                }
            }
        }
    }
}

async fn read_bearers(modem: &dyn Modem) -> Result<Vec<BearerSnapshot>> {
    let bearers = modem.bearers().await?;
    let mut snapshots = Vec::with_capacity(bearers.len());

    for bearer in bearers {
        let path = bearer.path().to_string();
        snapshots.push(BearerSnapshot {
            properties: soft(&path, "bearer properties", bearer.properties().await),
            stats: soft(&path, "bearer stats", bearer.stats().await),
            ipv4: soft(&path, "bearer ipv4", bearer.ipv4().await).flatten(),
            ipv6: soft(&path, "bearer ipv6", bearer.ipv6().await).flatten(),
            path,
        });
    }

    Ok(snapshots)
}

fn soft<T>(bearer: &str, field: &'static str, result: Result<T>) -> Option<T> {
    result
        .map_err(|e| warn!(bearer, field, error = %e, "cannot read bearer field"))
        .ok()
}

/// Extended signal reporting that must be switched off again.
///
/// [`release`](Self::release) disables reporting in line. If the guard is
/// dropped without being released, for instance because a deadline
/// cancelled the collection, the disable call is spawned onto the runtime.
pub struct SignalReportingGuard {
    modem: Option<Arc<dyn Modem>>,
}

impl SignalReportingGuard {
    pub fn new(modem: Arc<dyn Modem>) -> Self {
        Self { modem: Some(modem) }
    }

    pub async fn release(mut self) {
        if let Some(modem) = self.modem.take() {
            disable_signal(modem.as_ref()).await;
        }
    }
}

impl Drop for SignalReportingGuard {
    fn drop(&mut self) {
        let Some(modem) = self.modem.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { disable_signal(modem.as_ref()).await });
            }
            Err(_) => {
                warn!(
                    modem = modem.path(),
                    "no runtime left to disable extended signal reporting"
                );
            }
        }
    }
}

async fn disable_signal(modem: &dyn Modem) {
    if let Err(e) = modem.setup_signal(0).await {
        warn!(modem = modem.path(), error = %e, "cannot disable extended signal reporting");
    }
}
