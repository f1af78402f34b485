//! Read-only projections of the solved state and the sink they go to.

use crate::config::FrameNames;
use crate::poses::PoseTable;
use crate::registry::Registry;
use lh_core::{vec6_to_iso3, Pt3, Quat, Real, Transform6, TrackerGeometry, Vec3};
use log::{debug, info};
use serde::Serialize;

/// A named static transform `parent_from_child`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameTransform {
    pub parent: String,
    pub child: String,
    pub transform: Transform6,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    /// Time-bin centre, seconds.
    pub stamp: Real,
    pub position: Pt3,
}

/// Positions of one tracker as seen by one lighthouse, in the vive frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub lighthouse: String,
    pub tracker: String,
    pub frame: String,
    pub points: Vec<TrajectoryPoint>,
}

/// Position and orientation of one sensor; the marker's x axis is the
/// sensor normal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorMarker {
    pub frame: String,
    pub id: usize,
    pub position: Pt3,
    pub orientation: Quat,
}

/// Receives everything a session publishes.
pub trait ResultSink {
    fn publish_transforms(&mut self, _transforms: &[FrameTransform]) {}
    fn publish_trajectory(&mut self, _trajectory: &Trajectory) {}
    fn publish_markers(&mut self, _tracker: &str, _markers: &[SensorMarker]) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {}

/// Writes published results to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn publish_transforms(&mut self, transforms: &[FrameTransform]) {
        for t in transforms {
            let v = &t.transform;
            info!(
                "{} -> {}: [{:.4} {:.4} {:.4}] [{:.4} {:.4} {:.4}]",
                t.parent, t.child, v[0], v[1], v[2], v[3], v[4], v[5]
            );
        }
    }

    fn publish_trajectory(&mut self, trajectory: &Trajectory) {
        info!(
            "trajectory of {} from {}: {} points",
            trajectory.tracker,
            trajectory.lighthouse,
            trajectory.points.len()
        );
    }

    fn publish_markers(&mut self, tracker: &str, markers: &[SensorMarker]) {
        debug!("{} sensor markers for {tracker}", markers.len());
    }
}

/// world <- vive, vive <- each lighthouse and body <- each tracker.
pub fn frame_transforms(
    frames: &FrameNames,
    registration: Transform6,
    registry: &Registry,
) -> Vec<FrameTransform> {
    let mut out = vec![FrameTransform {
        parent: frames.world.clone(),
        child: frames.vive.clone(),
        transform: registration,
    }];
    out.extend(registry.lighthouses().iter().map(|l| FrameTransform {
        parent: frames.vive.clone(),
        child: l.serial.clone(),
        transform: l.vive_from_lighthouse,
    }));
    out.extend(registry.trackers().iter().map(|t| FrameTransform {
        parent: frames.body.clone(),
        child: t.serial.clone(),
        transform: t.body_from_tracker,
    }));
    out
}

/// Tracker positions mapped through each lighthouse's solved transform.
pub fn trajectories(
    frames: &FrameNames,
    registry: &Registry,
    poses: &PoseTable,
    resolution: Real,
) -> Vec<Trajectory> {
    let mut out = Vec::new();
    for lighthouse in registry.lighthouses() {
        let Some(by_epoch) = poses.lighthouse(&lighthouse.serial) else {
            continue;
        };
        let vive_from_lighthouse = vec6_to_iso3(&lighthouse.vive_from_lighthouse);
        for tracker in registry.trackers() {
            let points: Vec<TrajectoryPoint> = by_epoch
                .iter()
                .filter(|((serial, _), _)| serial == &tracker.serial)
                .map(|((_, bin), t)| TrajectoryPoint {
                    stamp: *bin as Real * resolution,
                    position: vive_from_lighthouse.transform_point(&Pt3::new(t[0], t[1], t[2])),
                })
                .collect();
            if points.is_empty() {
                continue;
            }
            out.push(Trajectory {
                lighthouse: lighthouse.serial.clone(),
                tracker: tracker.serial.clone(),
                frame: frames.vive.clone(),
                points,
            });
        }
    }
    out
}

/// One marker per sensor with a non-zero normal, in the tracker's light frame.
pub fn sensor_markers(geometry: &TrackerGeometry) -> Vec<SensorMarker> {
    let frame = format!("{}/light", geometry.serial);
    geometry
        .sensors
        .iter()
        .enumerate()
        .filter(|(_, s)| s.normal.norm() > 0.0)
        .map(|(id, s)| {
            let orientation = Quat::rotation_between(&Vec3::x(), &s.normal).unwrap_or_else(|| {
                // Normal opposite to x.
                Quat::from_axis_angle(&Vec3::z_axis(), std::f64::consts::PI)
            });
            SensorMarker {
                frame: frame.clone(),
                id,
                position: s.position,
                orientation,
            }
        })
        .collect()
}
