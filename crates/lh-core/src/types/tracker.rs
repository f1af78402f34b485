use crate::{Pt3, Vec3};
use serde::{Deserialize, Serialize};

/// Calibration-time position and outward normal of one photodiode,
/// expressed in the tracker's light frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorExtrinsic {
    pub position: Pt3,
    pub normal: Vec3,
}

/// Known sensor geometry of one tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerGeometry {
    pub serial: String,
    pub sensors: Vec<SensorExtrinsic>,
}

impl TrackerGeometry {
    pub fn sensor(&self, idx: usize) -> Option<&SensorExtrinsic> {
        self.sensors.get(idx)
    }
}
