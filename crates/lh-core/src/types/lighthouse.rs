use serde::{Deserialize, Serialize};

/// Per-motor correction parameters broadcast by a lighthouse.
///
/// All values are transmitted as IEEE half floats and widened to `f32`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorCalibration {
    pub phase: f32,
    pub tilt: f32,
    pub curve: f32,
    pub gib_phase: f32,
    pub gib_mag: f32,
}

/// Lighthouse calibration record decoded from one OOTX packet.
///
/// A record is identified by its `serial`. `timestamp` is the timecode of the
/// bit that completed the packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LighthouseCalibration {
    pub serial: String,
    pub fw_version: u16,
    pub hw_version: u8,
    pub motors: [MotorCalibration; 2],
    pub accel: [i8; 3],
    pub sys_unlock_count: u8,
    pub mode_current: u8,
    pub sys_faults: u8,
    pub timestamp: u32,
}
