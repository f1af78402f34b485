use serde::{Deserialize, Serialize};

/// Maximum number of photodiodes on a tracker.
pub const MAX_NUM_SENSORS: usize = 32;

/// Maximum number of lighthouses a driver can track simultaneously.
pub const MAX_NUM_LIGHTHOUSES: usize = 2;

/// One raw light pulse reported by the acquisition layer.
///
/// `timecode` is a free-running 48 MHz counter that wraps at `u32::MAX`.
/// `duration` is the pulse width in the same ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseEvent {
    pub timecode: u32,
    pub sensor: u16,
    pub duration: u16,
}

impl PulseEvent {
    pub fn new(timecode: u32, sensor: u16, duration: u16) -> Self {
        Self {
            timecode,
            sensor,
            duration,
        }
    }
}

/// Rotor axis swept by a lighthouse during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Axis 0 (horizontal sweep, azimuth).
    Azimuth,
    /// Axis 1 (vertical sweep, elevation).
    Elevation,
}

impl Axis {
    /// Axis encoded in bit 0 of a demodulated acode.
    pub fn from_acode(acode: u8) -> Self {
        if acode & 0b1 == 0 {
            Axis::Azimuth
        } else {
            Axis::Elevation
        }
    }

    pub fn index(self) -> usize {
        match self {
            Axis::Azimuth => 0,
            Axis::Elevation => 1,
        }
    }

    /// The other axis.
    pub fn cross(self) -> Self {
        match self {
            Axis::Azimuth => Axis::Elevation,
            Axis::Elevation => Axis::Azimuth,
        }
    }
}
