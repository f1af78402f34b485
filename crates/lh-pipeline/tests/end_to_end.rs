//! Two lighthouses, one tracker: raw pulses in, registered lighthouses out.

use lh_core::synthetic::rig::{dome_tracker, project_sensors, wander_poses};
use lh_core::{
    vec6_to_iso3, Iso3, LighthouseCalibration, MotorCalibration, Real, TrackerGeometry, Vec3,
};
use lh_lightcap::synthetic::{PulseTrain, CYCLE_TICKS};
use lh_lightcap::timing::TICKS_PER_SECOND;
use lh_pipeline::publish::{FrameTransform, Trajectory};
use lh_pipeline::{CalibrationFile, ResultSink, Session, SessionConfig, TimeBins};

const TRACKER: &str = "LHR-TRACKER";
const RESOLUTION: Real = 0.5;
/// Time bins the tracker is lit in, one per pose; the bins between are dark.
const POSE_BINS: [i64; 5] = [8, 10, 12, 14, 16];
const CYCLES: usize = 1000;
/// Cycle after which both lighthouses have been identified.
const IDENTIFIED: usize = 400;

fn record(serial: &str, phase: f32) -> LighthouseCalibration {
    let motor = MotorCalibration {
        phase,
        tilt: 0.001,
        curve: 0.0,
        gib_phase: 0.5,
        gib_mag: 0.002,
    };
    LighthouseCalibration {
        serial: serial.into(),
        fw_version: 0x0436,
        hw_version: 9,
        motors: [motor, motor],
        accel: [0, 127, 0],
        ..Default::default()
    }
}

fn master_from_b() -> Iso3 {
    Iso3::new(Vec3::new(1.5, 0.0, 0.5), Vec3::new(0.0, -0.6, 0.0))
}

#[derive(Default)]
struct Collect {
    transforms: Vec<Vec<FrameTransform>>,
    trajectories: Vec<Trajectory>,
}

impl ResultSink for Collect {
    fn publish_transforms(&mut self, transforms: &[FrameTransform]) {
        self.transforms.push(transforms.to_vec());
    }

    fn publish_trajectory(&mut self, trajectory: &Trajectory) {
        self.trajectories.push(trajectory.clone());
    }
}

fn stamp(timecode: u32) -> Real {
    Real::from(timecode) / TICKS_PER_SECOND
}

/// Replay the pulse train into `session`. The tracker moves through five
/// poses; it is lit only while its sweeps land in that pose's time bin.
/// `on_identified` runs once both lighthouses are known. Returns the last
/// pulse time.
fn replay<S: ResultSink>(
    session: &mut Session<S>,
    geometry: &TrackerGeometry,
    mut on_identified: impl FnMut(&mut Session<S>),
) -> Real {
    let records = [record("1111111111", 0.01), record("2222222222", -0.02)];
    let mut train = PulseTrain::new([&records[0], &records[1]]).unwrap();
    let poses = wander_poses(POSE_BINS.len(), Vec3::new(0.0, 0.0, 2.0), 0.2);
    let lighthouse_from_master = [Iso3::identity(), master_from_b().inverse()];
    let mut last = 0.0;

    for cycle in 0..CYCLES {
        if cycle == IDENTIFIED {
            on_identified(session);
        }
        // A sweep is reported at the next cycle's first sync flash.
        let reported = stamp(train.cycle_time().wrapping_add(CYCLE_TICKS));
        let pose = (cycle >= IDENTIFIED)
            .then(|| TimeBins::bin_index(reported, RESOLUTION))
            .and_then(|bin| POSE_BINS.iter().position(|b| *b == bin));

        let (slot, axis) = train.sweeping();
        let hits: Vec<(u16, Real)> = match pose {
            Some(p) => project_sensors(&(lighthouse_from_master[slot] * poses[p]), &geometry.sensors)
                .iter()
                .enumerate()
                .filter_map(|(s, a)| a.map(|a| (s as u16, a[axis.index()])))
                .collect(),
            None => Vec::new(),
        };
        for pulse in train.next_cycle(&hits) {
            last = stamp(pulse.timecode);
            session.handle_pulse(last, TRACKER, pulse);
        }
    }
    last
}

fn config(dir: &tempfile::TempDir) -> SessionConfig {
    SessionConfig {
        calfile: dir.path().join("deepdive.json"),
        resolution: RESOLUTION,
        ..Default::default()
    }
}

fn assert_close_to_truth(t: &lh_core::Transform6) {
    let est = vec6_to_iso3(t);
    let gt = master_from_b();
    let dt = (est.translation.vector - gt.translation.vector).norm();
    let dr = est.rotation.angle_to(&gt.rotation);
    assert!(dt < 0.02, "translation error {dt}");
    assert!(dr < 0.01, "rotation error {dr}");
}

#[test]
fn recording_session_registers_second_lighthouse() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(config(&dir), Collect::default()).unwrap();
    let geometry = dome_tracker(TRACKER, 12, 0.1);
    session.register_tracker(geometry.clone());

    replay(&mut session, &geometry, |s| {
        assert_eq!(s.registry().lighthouses().len(), 2);
        assert_eq!(s.trigger().message, "Recording started.");
    });
    assert!(session.measurement_count() > 0);

    let outcome = session.trigger();
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "Recording stopped. Solution found.");
    let report = outcome.report.unwrap();
    assert_eq!(report.master, "1111111111");
    assert_eq!(report.poses.get("1111111111"), Some(&5));
    assert_eq!(report.poses.get("2222222222"), Some(&5));
    assert_eq!(report.residual_blocks, 5);

    let registry = session.registry();
    assert_eq!(registry.master().unwrap().serial, "1111111111");
    assert_eq!(registry.lighthouse("1111111111").unwrap().vive_from_lighthouse, [0.0; 6]);
    assert_close_to_truth(&registry.lighthouse("2222222222").unwrap().vive_from_lighthouse);

    // Persisted and published.
    let file = CalibrationFile::read(dir.path().join("deepdive.json"))
        .unwrap()
        .unwrap();
    assert_close_to_truth(&file.lighthouses["2222222222"]);
    let published = session.sink().transforms.last().unwrap();
    assert!(published.iter().any(|t| t.child == "2222222222"));

    let trajectories = &session.sink().trajectories;
    assert_eq!(trajectories.len(), 2);
    for (a, b) in trajectories[0].points.iter().zip(&trajectories[1].points) {
        assert_eq!(a.stamp, b.stamp);
        assert!((a.position - b.position).norm() < 0.02);
    }
}

#[test]
fn offline_replay_stops_on_idle() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&dir);
    cfg.offline = true;
    let mut session = Session::new(cfg, Collect::default()).unwrap();
    let geometry = dome_tracker(TRACKER, 12, 0.1);
    session.register_tracker(geometry.clone());

    let last = replay(&mut session, &geometry, |_| {});
    assert!(session.is_recording());
    assert!(session.poll_idle(last + 0.5).is_none());
    let outcome = session.poll_idle(last + 1.5).unwrap();
    assert!(outcome.success, "{}", outcome.message);
    assert!(!session.is_recording());
    assert_close_to_truth(&session.registry().lighthouse("2222222222").unwrap().vive_from_lighthouse);

    // A fresh session starts from the written calibration.
    let restarted = Session::new(config(&dir), Collect::default()).unwrap();
    let lh = restarted.registry().lighthouse("2222222222").unwrap();
    assert!(lh.ready);
    assert_close_to_truth(&lh.vive_from_lighthouse);
}
