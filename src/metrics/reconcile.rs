//! Self-healing nudge for modems stuck in `Registered`.
//!
//! A modem that is registered but has no working data session while an
//! APN is configured gets its bearers torn down and one fresh connection
//! attempt. Nothing is retried and the outcome is not verified; failures
//! are logged and never stop the modem's telemetry.

use serde::Serialize;
use tracing::{info, warn};

use crate::modem::traits::Modem;
use crate::modem::types::ModemState;

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub attempted: bool,
    pub bearers_deleted: usize,
    pub bearers_failed: usize,
    /// Path of the bearer created by the connection attempt.
    pub new_bearer: Option<String>,
}

/// Tears down stale bearers and reconnects on the configured APN.
#[derive(Debug, Clone, Default)]
pub struct ConnectionReconciler {
    apn: Option<String>,
}

impl ConnectionReconciler {
    /// An empty APN disables reconciliation.
    pub fn new(apn: Option<String>) -> Self {
        Self {
            apn: apn.filter(|apn| !apn.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.apn.is_some()
    }

    /// Reconcile `modem` given the state read during collection.
    pub async fn reconcile(&self, modem: &dyn Modem, state: Option<ModemState>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let Some(apn) = self.apn.as_deref() else {
            return report;
        };
        if state != Some(ModemState::Registered) {
            return report;
        }

        let path = modem.path();
        report.attempted = true;
        info!(modem = path, apn, "modem registered without data session, reconnecting");

        let bearers = modem.bearers().await.unwrap_or_else(|e| {
            warn!(modem = path, error = %e, "cannot list bearers");
            Vec::new()
        });

        for bearer in bearers {
            if let Err(e) = bearer.disconnect().await {
                warn!(modem = path, bearer = bearer.path(), error = %e, "cannot disconnect bearer");
            }
            match modem.delete_bearer(bearer.as_ref()).await {
                Ok(()) => report.bearers_deleted += 1,
                Err(e) => {
                    warn!(modem = path, bearer = bearer.path(), error = %e, "cannot delete bearer");
                    report.bearers_failed += 1;
                }
            }
        }

        match modem.connect(apn).await {
            Ok(bearer) => {
                info!(modem = path, bearer = bearer.path(), "new bearer");
                report.new_bearer = Some(bearer.path().to_string());
            }
            Err(e) => warn!(modem = path, apn, error = %e, "cannot connect"),
        }

        report
    }
}
