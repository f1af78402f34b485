//! Light-capture decoding for lighthouse trackers.
//!
//! A tracker reports `(timecode, sensor, duration)` pulses. This crate turns
//! that stream into two products:
//!
//! - [`LighthouseCalibration`](lh_core::LighthouseCalibration) records, decoded
//!   from the OOTX bit stream each lighthouse modulates onto its sync flashes;
//! - [`MeasurementBundle`](lh_core::MeasurementBundle)s, one per sweep cycle,
//!   holding the mid-pulse sweep offset of every sensor that was hit.
//!
//! Processing is strictly sequential per tracker and fully deterministic: the
//! same pulse sequence always yields the same records and bundles.
//!
//! Pipeline per pulse:
//! `classify -> (sync: flush sweep, update cycle, feed OOTX bit) | (sweep: select active lighthouse, accumulate)`

mod driver;
pub mod ootx;
pub mod payload;
mod slots;
mod sweep;
mod sync;
pub mod synthetic;
pub mod timing;

pub use driver::{classify, LightcapDriver, LightcapListener, PulseClass, TrackerLightcap};
pub use ootx::{OotxDecoder, OotxState};
pub use payload::PayloadError;
pub use slots::LighthouseTable;
pub use sweep::SweepAccumulator;
pub use sync::{ActiveSweep, SyncTracker};
