//! Per-epoch tracker poses in every lighthouse frame.

use crate::registry::Registry;
use crate::store::{mean_angles, TimeBins};
use lh_core::{iso3_to_vec6, Pt2, Pt3, Transform6};
use lh_linear::pnp::MIN_CORRESPONDENCES;
use lh_linear::{correct_angles, ImagePlane, PnpSolver};
use lh_optim::problems::lighthouse_registration::EpochKey;
use lh_optim::{LighthousePoses, RegistrationDataset};
use log::{debug, info};
use std::collections::BTreeMap;

/// `lighthouse_from_tracker` poses, per lighthouse and epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseTable {
    poses: BTreeMap<String, BTreeMap<EpochKey, Transform6>>,
}

impl PoseTable {
    pub fn insert(&mut self, lighthouse: &str, epoch: EpochKey, pose: Transform6) {
        self.poses
            .entry(lighthouse.to_string())
            .or_default()
            .insert(epoch, pose);
    }

    pub fn get(&self, lighthouse: &str, epoch: &EpochKey) -> Option<&Transform6> {
        self.poses.get(lighthouse).and_then(|p| p.get(epoch))
    }

    pub fn lighthouse(&self, lighthouse: &str) -> Option<&BTreeMap<EpochKey, Transform6>> {
        self.poses.get(lighthouse)
    }

    pub fn count(&self, lighthouse: &str) -> usize {
        self.poses.get(lighthouse).map_or(0, BTreeMap::len)
    }

    pub fn total(&self) -> usize {
        self.poses.values().map(BTreeMap::len).sum()
    }

    /// Registration input with lighthouses in `order`.
    ///
    /// The first serial is always the master, even without poses. Later
    /// lighthouses without poses are left out.
    pub fn to_dataset<'a>(&self, order: impl IntoIterator<Item = &'a str>) -> RegistrationDataset {
        let mut order = order.into_iter();
        let Some(master) = order.next() else {
            return RegistrationDataset::default();
        };
        let master = LighthousePoses {
            serial: master.to_string(),
            poses: self.poses.get(master).cloned().unwrap_or_default(),
        };
        let slaves = order.filter_map(|serial| {
            let poses = self.poses.get(serial).filter(|p| !p.is_empty())?;
            Some(LighthousePoses {
                serial: serial.to_string(),
                poses: poses.clone(),
            })
        });
        RegistrationDataset {
            lighthouses: std::iter::once(master).chain(slaves).collect(),
        }
    }
}

/// Solve PnP for every (tracker, lighthouse, bin) cell with enough sensors
/// sampled on both axes. Cells that fail are skipped.
pub fn estimate_poses(bins: &TimeBins, registry: &Registry, correct: bool) -> PoseTable {
    let plane = ImagePlane::default();
    let mut table = PoseTable::default();

    for lighthouse in registry.lighthouses() {
        let calibration = lighthouse.calibration.as_ref().filter(|_| correct);
        for tracker in registry.trackers() {
            let Some(geometry) = &tracker.geometry else {
                continue;
            };
            debug!("- lighthouse {} and tracker {}", lighthouse.serial, tracker.serial);
            for (bin, samples) in bins.epochs(&tracker.serial, &lighthouse.serial) {
                let mut world: Vec<Pt3> = Vec::new();
                let mut image: Vec<Pt2> = Vec::new();
                for (sensor, angles) in mean_angles(samples) {
                    let Some(extrinsic) = geometry.sensor(usize::from(sensor)) else {
                        continue;
                    };
                    let angles = match calibration {
                        Some(cal) => correct_angles(angles, cal),
                        None => angles,
                    };
                    world.push(extrinsic.position);
                    image.push(plane.project(angles));
                }
                if world.len() < MIN_CORRESPONDENCES {
                    continue;
                }
                match PnpSolver::solve_on_plane(&world, &image, &plane) {
                    Ok(pose) => table.insert(
                        &lighthouse.serial,
                        (tracker.serial.clone(), bin),
                        iso3_to_vec6(&pose),
                    ),
                    Err(err) => debug!(
                        "no pose for {} in {} at bin {bin}: {err}",
                        tracker.serial, lighthouse.serial
                    ),
                }
            }
        }
    }
    info!("Using {} PnP solutions", table.total());
    table
}
