//! Modem collection pipeline.
//!
//! This module holds the core of the exporter: reading a best-effort
//! snapshot of each modem, deriving secondary values from it, and nudging
//! registered-but-disconnected modems back online.

pub mod collector;
pub mod data;
pub mod derive;
pub mod reconcile;

// Re-export commonly used items
pub use collector::{FieldPolicy, PipelineProfile, SettleStrategy, SnapshotReader};
pub use data::{CollectedModem, DerivedFields, ModemIdentity, ModemSnapshot};
pub use reconcile::ConnectionReconciler;
