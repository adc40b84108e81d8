//! Emitters turning collected modems into external telemetry formats.
//!
//! Both emitters consume the same [`CollectedModem`](crate::metrics::data::CollectedModem)
//! values but expose different field sets: the Prometheus emitter holds
//! a fixed set of gauges, the line-protocol emitter writes whatever the
//! snapshot contains.

pub mod influx;
pub mod prometheus;

pub use self::influx::{PushEmitter, Record};
pub use self::prometheus::PullEmitter;
