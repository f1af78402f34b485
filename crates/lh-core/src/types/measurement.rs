use crate::{Axis, Real};
use serde::{Deserialize, Serialize};

/// One sensor hit inside a sweep cycle, in raw timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepHit {
    pub sensor: u16,
    /// Mid-pulse offset from the start of the sweep, ticks.
    pub angle: u32,
    /// Rising edge of the pulse, ticks.
    pub time: u32,
    /// Pulse width, ticks.
    pub duration: u16,
}

/// All hits a tracker recorded for one lighthouse sweep.
///
/// Emitted once per completed sweep cycle, only after the lighthouse has been
/// identified through its OOTX broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementBundle {
    pub lighthouse: String,
    pub tracker: String,
    pub axis: Axis,
    pub sync_time: u32,
    pub hits: Vec<SweepHit>,
}

/// A sensor hit converted into physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    pub sensor: u16,
    /// Sweep angle, radians.
    pub angle: Real,
    /// Pulse width, seconds.
    pub duration: Real,
}

/// A measurement bundle in physical units, as kept by the measurement store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub lighthouse: String,
    pub tracker: String,
    pub axis: Axis,
    pub pulses: Vec<Pulse>,
}
