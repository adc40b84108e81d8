//! Access to the modem-management backend.

pub mod mmcli;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use mmcli::MmcliManager;
pub use traits::{Bearer, Modem, ModemManager};
