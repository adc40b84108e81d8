//! Orchestration of one collection pass across all modems.

use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, warn};

use crate::config::ExporterConfig;
use crate::error::{ExporterError, Result};
use crate::export::{PullEmitter, PushEmitter};
use crate::metrics::collector::{PipelineProfile, SnapshotReader};
use crate::metrics::data::CollectedModem;
use crate::metrics::derive::derive;
use crate::metrics::reconcile::ConnectionReconciler;
use crate::modem::traits::{Modem, ModemManager};

/// Drives the collection pipeline for every modem and feeds the emitters.
///
/// Nothing is cached between passes: every scrape lists the modems again
/// and reads each of them from scratch.
pub struct Exporter {
    manager: Arc<dyn ModemManager>,
    config: ExporterConfig,
    reconciler: ConnectionReconciler,
    pull: Mutex<PullEmitter>,
    push: PushEmitter,
}

impl Exporter {
    pub fn new(manager: Arc<dyn ModemManager>, config: ExporterConfig) -> Result<Self> {
        Ok(Self {
            reconciler: ConnectionReconciler::new(config.apn.clone()),
            pull: Mutex::new(PullEmitter::new()?),
            push: PushEmitter::new(),
            manager,
            config,
        })
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<dyn ModemManager> {
        &self.manager
    }

    /// List the modems and collect every one that can be identified.
    ///
    /// Fails only when the modem list itself cannot be retrieved.
    pub async fn collect(&self, profile: &PipelineProfile) -> Result<Vec<CollectedModem>> {
        let modems = self.manager.list_modems().await?;
        Ok(self.collect_modems(&modems, profile).await)
    }

    /// Run a pass for the Prometheus endpoint and render it.
    ///
    /// `modem_up` is set once the modem list has been retrieved and does
    /// not reflect how individual modems fared. When listing fails the
    /// response is empty.
    pub async fn scrape_prometheus(&self) -> Result<String> {
        let emitter = self.pull.lock().await;
        emitter.reset();

        match self.manager.list_modems().await {
            Ok(modems) => {
                emitter.emit_up();
                for modem in self.collect_modems(&modems, &PipelineProfile::pull()).await {
                    emitter.emit_modem(&modem);
                }
            }
            Err(e) => error!(error = %e, "cannot list modems"),
        }

        emitter.render()
    }

    /// Run a pass for the line-protocol endpoint and render it.
    pub async fn scrape_influx(&self) -> Result<String> {
        let modems = self.collect(&PipelineProfile::push()).await?;

        let mut out = String::new();
        for modem in &modems {
            self.push.emit_modem(&mut out, modem);
        }
        Ok(out)
    }

    async fn collect_modems(
        &self,
        modems: &[Arc<dyn Modem>],
        profile: &PipelineProfile,
    ) -> Vec<CollectedModem> {
        if self.config.concurrent_modems {
            join_all(modems.iter().map(|modem| self.collect_guarded(modem, profile)))
                .await
                .into_iter()
                .flatten()
                .collect()
        } else {
            let mut collected = Vec::with_capacity(modems.len());
            for modem in modems {
                if let Some(modem) = self.collect_guarded(modem, profile).await {
                    collected.push(modem);
                }
            }
            collected
        }
    }

    /// Collect one modem under the configured deadline. Failures are
    /// logged and the modem is left out of the pass.
    ///
    /// Reconciliation runs once the modem has been collected, under a
    /// deadline of its own, so a slow reconnect never drops a modem that
    /// was already read.
    async fn collect_guarded(
        &self,
        modem: &Arc<dyn Modem>,
        profile: &PipelineProfile,
    ) -> Option<CollectedModem> {
        let result = match self.config.modem_timeout {
            Some(limit) => time::timeout(limit, self.collect_modem(modem, profile))
                .await
                .unwrap_or_else(|_| {
                    Err(ExporterError::timeout_error(format!(
                        "{}: no answer within {:?}",
                        modem.path(),
                        limit
                    )))
                }),
            None => self.collect_modem(modem, profile).await,
        };

        let collected = match result {
            Ok(collected) => collected,
            Err(e) => {
                error!(modem = modem.path(), error = %e, "skipping modem");
                return None;
            }
        };

        self.reconcile_guarded(modem, &collected).await;
        Some(collected)
    }

    async fn collect_modem(
        &self,
        modem: &Arc<dyn Modem>,
        profile: &PipelineProfile,
    ) -> Result<CollectedModem> {
        let (identity, snapshot) = SnapshotReader::new(profile).read(modem).await?;
        let timestamp_ns = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let derived = derive(&snapshot, profile.registered_rule);

        Ok(CollectedModem {
            identity,
            snapshot,
            derived,
            timestamp_ns,
        })
    }

    async fn reconcile_guarded(&self, modem: &Arc<dyn Modem>, collected: &CollectedModem) {
        let state = collected.snapshot.state;
        let report = match self.config.modem_timeout {
            Some(limit) => {
                match time::timeout(limit, self.reconciler.reconcile(modem.as_ref(), state)).await {
                    Ok(report) => report,
                    Err(_) => {
                        warn!(modem = modem.path(), ?limit, "reconciliation did not finish in time");
                        return;
                    }
                }
            }
            None => self.reconciler.reconcile(modem.as_ref(), state).await,
        };

        if report.attempted {
            debug!(modem = modem.path(), ?report, "reconciliation finished");
        }
    }
}
