//! Persisted calibration: frame names, registration and solved transforms.

use crate::config::FrameNames;
use crate::registry::Registry;
use anyhow::{Context, Result};
use lh_core::{Transform6, IDENTITY6};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub frames: FrameNames,
    /// `world_from_vive`.
    pub registration: Transform6,
    /// `vive_from_lighthouse` per lighthouse serial.
    pub lighthouses: BTreeMap<String, Transform6>,
    /// `body_from_tracker` per tracker serial.
    pub trackers: BTreeMap<String, Transform6>,
}

impl Default for CalibrationFile {
    fn default() -> Self {
        Self {
            frames: FrameNames::default(),
            registration: IDENTITY6,
            lighthouses: BTreeMap::new(),
            trackers: BTreeMap::new(),
        }
    }
}

impl CalibrationFile {
    /// Snapshot of the registry's current transforms.
    pub fn from_registry(frames: &FrameNames, registration: Transform6, registry: &Registry) -> Self {
        Self {
            frames: frames.clone(),
            registration,
            lighthouses: registry
                .lighthouses()
                .iter()
                .map(|l| (l.serial.clone(), l.vive_from_lighthouse))
                .collect(),
            trackers: registry
                .trackers()
                .iter()
                .map(|t| (t.serial.clone(), t.body_from_tracker))
                .collect(),
        }
    }

    /// Read a calibration file; `Ok(None)` when it does not exist.
    pub fn read(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let file = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse calibration {}", path.display()))?;
        Ok(Some(file))
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write calibration {}", path.display()))
    }

    /// Copy the stored transforms into `registry` and mark every listed
    /// entity ready. Returns the stored registration.
    pub fn apply(&self, frames: &FrameNames, registry: &mut Registry) -> Transform6 {
        if &self.frames != frames {
            warn!(
                "calibration frames {:?} differ from configured frames {:?}",
                self.frames, frames
            );
        }
        for (serial, t) in &self.lighthouses {
            let entry = registry.lighthouse_entry(serial);
            entry.vive_from_lighthouse = *t;
            entry.ready = true;
        }
        for (serial, t) in &self.trackers {
            let entry = registry.tracker_entry(serial);
            entry.body_from_tracker = *t;
            entry.ready = true;
        }
        self.registration
    }
}
