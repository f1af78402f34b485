//! Trackers and lighthouses known to a session.
//!
//! Both registries keep insertion order. The first lighthouse is the master:
//! its frame is the vive frame.

use crate::config::SessionConfig;
use anyhow::Result;
use lh_core::{LighthouseCalibration, Transform6, TrackerGeometry, IDENTITY6};
use log::info;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerEntry {
    pub serial: String,
    pub geometry: Option<TrackerGeometry>,
    pub body_from_tracker: Transform6,
    /// Geometry is known, either registered or loaded from the calibration file.
    pub ready: bool,
}

impl TrackerEntry {
    fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            geometry: None,
            body_from_tracker: IDENTITY6,
            ready: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LighthouseEntry {
    pub serial: String,
    pub calibration: Option<LighthouseCalibration>,
    pub vive_from_lighthouse: Transform6,
    /// Calibration record received, or transform loaded from the calibration file.
    pub ready: bool,
}

impl LighthouseEntry {
    fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            calibration: None,
            vive_from_lighthouse: IDENTITY6,
            ready: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    trackers: Vec<TrackerEntry>,
    lighthouses: Vec<LighthouseEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed entries and prior transforms from the configuration. Nothing is
    /// marked ready.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let mut registry = Self::new();
        for lh in &config.lighthouses {
            let t = lh.transform6()?;
            registry.lighthouse_entry(&lh.serial).vive_from_lighthouse = t;
        }
        for tr in &config.trackers {
            let t = tr.transform6()?;
            registry.tracker_entry(&tr.serial).body_from_tracker = t;
        }
        Ok(registry)
    }

    pub fn trackers(&self) -> &[TrackerEntry] {
        &self.trackers
    }

    pub fn lighthouses(&self) -> &[LighthouseEntry] {
        &self.lighthouses
    }

    pub fn tracker(&self, serial: &str) -> Option<&TrackerEntry> {
        self.trackers.iter().find(|t| t.serial == serial)
    }

    pub fn lighthouse(&self, serial: &str) -> Option<&LighthouseEntry> {
        self.lighthouses.iter().find(|l| l.serial == serial)
    }

    /// The master lighthouse, if any lighthouse is known.
    pub fn master(&self) -> Option<&LighthouseEntry> {
        self.lighthouses.first()
    }

    /// Entry for `serial`, created (not ready) when unknown.
    pub fn tracker_entry(&mut self, serial: &str) -> &mut TrackerEntry {
        let idx = match self.trackers.iter().position(|t| t.serial == serial) {
            Some(idx) => idx,
            None => {
                self.trackers.push(TrackerEntry::new(serial));
                self.trackers.len() - 1
            }
        };
        &mut self.trackers[idx]
    }

    /// Entry for `serial`, created (not ready) when unknown.
    pub fn lighthouse_entry(&mut self, serial: &str) -> &mut LighthouseEntry {
        let idx = match self.lighthouses.iter().position(|l| l.serial == serial) {
            Some(idx) => idx,
            None => {
                self.lighthouses.push(LighthouseEntry::new(serial));
                self.lighthouses.len() - 1
            }
        };
        &mut self.lighthouses[idx]
    }

    /// Record a tracker's sensor geometry and mark it ready.
    ///
    /// Returns true the first time the tracker becomes ready.
    pub fn register_tracker(&mut self, geometry: TrackerGeometry) -> bool {
        let entry = self.tracker_entry(&geometry.serial);
        let found = !entry.ready;
        entry.geometry = Some(geometry);
        entry.ready = true;
        if found {
            info!("Found tracker {}", entry.serial);
        }
        found
    }

    /// Record a decoded lighthouse calibration and mark it ready.
    ///
    /// Returns true the first time the lighthouse becomes ready.
    pub fn register_lighthouse(&mut self, record: &LighthouseCalibration) -> bool {
        let entry = self.lighthouse_entry(&record.serial);
        let found = !entry.ready;
        entry.calibration = Some(record.clone());
        entry.ready = true;
        if found {
            info!("Found lighthouse {}", entry.serial);
        }
        found
    }

    /// True when both entities are known and ready.
    pub fn accepts(&self, tracker: &str, lighthouse: &str) -> bool {
        self.tracker(tracker).is_some_and(|t| t.ready)
            && self.lighthouse(lighthouse).is_some_and(|l| l.ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityConfig;
    use lh_core::synthetic::rig::dome_tracker;

    fn record(serial: &str) -> LighthouseCalibration {
        LighthouseCalibration {
            serial: serial.into(),
            ..Default::default()
        }
    }

    #[test]
    fn keeps_insertion_order_and_master() {
        let mut registry = Registry::new();
        assert!(registry.master().is_none());
        registry.register_lighthouse(&record("ZZZ"));
        registry.register_lighthouse(&record("AAA"));
        assert_eq!(registry.master().unwrap().serial, "ZZZ");
        let serials: Vec<_> = registry.lighthouses().iter().map(|l| l.serial.as_str()).collect();
        assert_eq!(serials, ["ZZZ", "AAA"]);
    }

    #[test]
    fn readiness_gates_acceptance() {
        let mut registry = Registry::new();
        assert!(!registry.accepts("T", "L"));
        registry.register_lighthouse(&record("L"));
        assert!(!registry.accepts("T", "L"));
        assert!(registry.register_tracker(dome_tracker("T", 8, 0.1)));
        assert!(!registry.register_tracker(dome_tracker("T", 8, 0.1)));
        assert!(registry.accepts("T", "L"));
        assert!(!registry.accepts("T", "M"));
    }

    #[test]
    fn config_seeds_priors_without_readiness() {
        let config = SessionConfig {
            lighthouses: vec![EntityConfig {
                serial: "L".into(),
                transform: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            }],
            trackers: vec![EntityConfig {
                serial: "T".into(),
                transform: vec![0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 1.0],
            }],
            ..Default::default()
        };
        let mut registry = Registry::from_config(&config).unwrap();
        let lh = registry.lighthouse("L").unwrap();
        assert_eq!(lh.vive_from_lighthouse, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(!lh.ready);
        assert_eq!(registry.tracker("T").unwrap().body_from_tracker[1], 0.5);

        registry.register_lighthouse(&record("L"));
        assert_eq!(
            registry.lighthouse("L").unwrap().vive_from_lighthouse[0],
            1.0,
            "registration keeps the prior"
        );
    }
}
