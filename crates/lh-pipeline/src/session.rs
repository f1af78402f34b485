use crate::calfile::CalibrationFile;
use crate::config::SessionConfig;
use crate::publish::{frame_transforms, sensor_markers, trajectories, ResultSink};
use crate::registry::Registry;
use crate::solve::{solve_registration, Solution, SolveReport};
use crate::store::{light_from_bundle, AcceptanceFilter, MeasurementStore};
use anyhow::Result;
use lh_core::{
    Light, LighthouseCalibration, MeasurementBundle, PulseEvent, Real, Transform6,
    TrackerGeometry, IDENTITY6,
};
use lh_lightcap::{LightcapDriver, LightcapListener};
use log::{info, warn};
use serde::Serialize;

/// Result of toggling the recording trigger.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub success: bool,
    pub message: String,
    /// Present when recording stopped and a solution was found.
    pub report: Option<SolveReport>,
}

impl TriggerOutcome {
    fn new(success: bool, message: &str) -> Self {
        Self {
            success,
            message: message.to_string(),
            report: None,
        }
    }
}

/// Store `light` if recording and both entities are ready, after filtering.
fn accept_light(
    registry: &Registry,
    store: &mut MeasurementStore,
    filter: &AcceptanceFilter,
    recording: bool,
    stamp: Real,
    light: Light,
) -> bool {
    if !recording || !registry.accepts(&light.tracker, &light.lighthouse) {
        return false;
    }
    match filter.filter(light) {
        Some(light) => {
            store.push(stamp, light);
            true
        }
        None => false,
    }
}

/// Routes decoder output into the registry and the measurement store.
struct Intake<'a> {
    registry: &'a mut Registry,
    store: &'a mut MeasurementStore,
    filter: &'a AcceptanceFilter,
    recording: bool,
    stamp: Real,
}

impl LightcapListener for Intake<'_> {
    fn on_lighthouse(&mut self, record: &LighthouseCalibration) {
        self.registry.register_lighthouse(record);
    }

    fn on_measurement(&mut self, bundle: MeasurementBundle) {
        accept_light(
            self.registry,
            self.store,
            self.filter,
            self.recording,
            self.stamp,
            light_from_bundle(&bundle),
        );
    }
}

/// One calibration session: decoder, registries, recorded light and the
/// current calibration.
#[derive(Debug)]
pub struct Session<S: ResultSink> {
    config: SessionConfig,
    filter: AcceptanceFilter,
    registry: Registry,
    driver: LightcapDriver,
    store: MeasurementStore,
    /// `world_from_vive`.
    registration: Transform6,
    recording: bool,
    /// Time of the last pulse; arms the idle trigger.
    last_light: Option<Real>,
    last_report: Option<SolveReport>,
    sink: S,
}

impl<S: ResultSink> Session<S> {
    /// Build a session, seed it from the configuration and the calibration
    /// file, and publish the starting transforms.
    pub fn new(config: SessionConfig, sink: S) -> Result<Self> {
        config.validate()?;
        let mut registry = Registry::from_config(&config)?;
        let mut registration = IDENTITY6;
        match CalibrationFile::read(&config.calfile) {
            Ok(Some(file)) => {
                registration = file.apply(&config.frames, &mut registry);
                info!("Read transforms from calibration");
            }
            Ok(None) => info!("Could not read calibration file"),
            Err(err) => warn!("Could not read calibration file: {err:#}"),
        }
        if config.offline {
            info!("Offline mode: recording from the start");
        }

        let mut session = Self {
            filter: AcceptanceFilter::new(&config.thresholds),
            recording: config.offline,
            config,
            registry,
            driver: LightcapDriver::new(),
            store: MeasurementStore::new(),
            registration,
            last_light: None,
            last_report: None,
            sink,
        };
        session.publish_transforms();
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn driver(&self) -> &LightcapDriver {
        &self.driver
    }

    pub fn registration(&self) -> Transform6 {
        self.registration
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Bundles recorded since recording started.
    pub fn measurement_count(&self) -> usize {
        self.store.len()
    }

    pub fn last_report(&self) -> Option<&SolveReport> {
        self.last_report.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Register a tracker's sensor geometry; it becomes ready.
    pub fn register_tracker(&mut self, geometry: TrackerGeometry) {
        let markers = self.config.visualize.then(|| sensor_markers(&geometry));
        let serial = geometry.serial.clone();
        self.registry.register_tracker(geometry);
        if let Some(markers) = markers {
            self.sink.publish_markers(&serial, &markers);
        }
    }

    /// Feed one pulse of `tracker`, timestamped `stamp` seconds.
    pub fn handle_pulse(&mut self, stamp: Real, tracker: &str, pulse: PulseEvent) {
        let mut intake = Intake {
            registry: &mut self.registry,
            store: &mut self.store,
            filter: &self.filter,
            recording: self.recording,
            stamp,
        };
        self.driver.handle_pulse(tracker, pulse, &mut intake);
        self.last_light = Some(stamp);
    }

    /// Record an already decoded bundle. Returns whether it was kept.
    pub fn handle_light(&mut self, stamp: Real, light: Light) -> bool {
        self.last_light = Some(stamp);
        accept_light(
            &self.registry,
            &mut self.store,
            &self.filter,
            self.recording,
            stamp,
            light,
        )
    }

    /// Toggle recording. Starting clears recorded light; stopping solves
    /// with everything recorded.
    pub fn trigger(&mut self) -> TriggerOutcome {
        if !self.recording {
            self.store.clear();
            self.recording = true;
            info!("Recording started.");
            return TriggerOutcome::new(true, "Recording started.");
        }

        self.recording = false;
        let measurements = self.store.take();
        if measurements.is_empty() {
            warn!("Recording stopped without measurements");
            return TriggerOutcome::new(
                false,
                "Recording stopped. No measurements were recorded, so no solve was attempted.",
            );
        }

        match solve_registration(&measurements, &self.registry, &self.config) {
            Ok(solution) => {
                self.apply_solution(&solution);
                let mut outcome = TriggerOutcome::new(true, "Recording stopped. Solution found.");
                outcome.report = Some(solution.report.clone());
                self.last_report = Some(solution.report);
                outcome
            }
            Err(err) => {
                warn!("- Solution not found: {err:#}");
                TriggerOutcome::new(false, "Recording stopped. Solution not found.")
            }
        }
    }

    /// Stop recording when no light arrived for `idle_timeout` seconds
    /// before `now`. Fires at most once per burst of light.
    pub fn poll_idle(&mut self, now: Real) -> Option<TriggerOutcome> {
        let last = self.last_light?;
        if !self.recording || now - last < self.config.idle_timeout {
            return None;
        }
        self.last_light = None;
        info!("No light for {:.3} seconds, stopping", now - last);
        Some(self.trigger())
    }

    fn apply_solution(&mut self, solution: &Solution) {
        for (serial, t) in &solution.report.transforms {
            self.registry.lighthouse_entry(serial).vive_from_lighthouse = *t;
        }
        self.publish_transforms();

        let file = CalibrationFile::from_registry(
            &self.config.frames,
            self.registration,
            &self.registry,
        );
        match file.write(&self.config.calfile) {
            Ok(()) => info!("Calibration written to {}", self.config.calfile.display()),
            Err(err) => warn!(
                "Could not write calibration to {}: {err:#}",
                self.config.calfile.display()
            ),
        }

        if self.config.visualize {
            for trajectory in trajectories(
                &self.config.frames,
                &self.registry,
                &solution.poses,
                solution.resolution,
            ) {
                self.sink.publish_trajectory(&trajectory);
            }
        }
    }

    fn publish_transforms(&mut self) {
        let transforms = frame_transforms(&self.config.frames, self.registration, &self.registry);
        self.sink.publish_transforms(&transforms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{FrameTransform, NullSink, SensorMarker, Trajectory};
    use lh_core::synthetic::rig::dome_tracker;
    use lh_core::{Axis, Pulse};

    #[derive(Debug, Default)]
    struct Collect {
        transforms: Vec<Vec<FrameTransform>>,
        trajectories: Vec<Trajectory>,
        markers: usize,
    }

    impl ResultSink for Collect {
        fn publish_transforms(&mut self, transforms: &[FrameTransform]) {
            self.transforms.push(transforms.to_vec());
        }
        fn publish_trajectory(&mut self, trajectory: &Trajectory) {
            self.trajectories.push(trajectory.clone());
        }
        fn publish_markers(&mut self, _tracker: &str, markers: &[SensorMarker]) {
            self.markers += markers.len();
        }
    }

    fn config(dir: &tempfile::TempDir) -> SessionConfig {
        SessionConfig {
            calfile: dir.path().join("cal.json"),
            ..Default::default()
        }
    }

    fn light(pulses: usize) -> Light {
        Light {
            lighthouse: "L".into(),
            tracker: "T".into(),
            axis: Axis::Azimuth,
            pulses: (0..pulses)
                .map(|s| Pulse {
                    sensor: s as u16,
                    angle: 0.1,
                    duration: 1e-5,
                })
                .collect(),
        }
    }

    fn ready_session(dir: &tempfile::TempDir) -> Session<NullSink> {
        let mut session = Session::new(config(dir), NullSink).unwrap();
        session.register_tracker(dome_tracker("T", 8, 0.1));
        session.registry.register_lighthouse(&LighthouseCalibration {
            serial: "L".into(),
            ..Default::default()
        });
        session
    }

    #[test]
    fn trigger_toggles_and_fails_fast_without_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ready_session(&dir);
        assert!(!session.is_recording());

        let started = session.trigger();
        assert!(started.success);
        assert_eq!(started.message, "Recording started.");
        assert!(session.is_recording());

        let stopped = session.trigger();
        assert!(!stopped.success);
        assert!(stopped.message.contains("No measurements"));
        assert!(!session.is_recording());
        assert!(!dir.path().join("cal.json").exists());
    }

    #[test]
    fn light_is_only_kept_while_recording_and_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ready_session(&dir);
        assert!(!session.handle_light(0.0, light(6)));
        session.trigger();
        assert!(session.handle_light(0.0, light(6)));
        assert!(!session.handle_light(0.0, light(3)), "below count threshold");
        let mut unknown = light(6);
        unknown.lighthouse = "other".into();
        assert!(!session.handle_light(0.0, unknown));
        assert_eq!(session.measurement_count(), 1);

        // Starting again clears what was recorded.
        session.trigger();
        session.trigger();
        assert_eq!(session.measurement_count(), 0);
    }

    #[test]
    fn unsolvable_recording_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ready_session(&dir);
        session.trigger();
        session.handle_light(0.0, light(6));
        let outcome = session.trigger();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Recording stopped. Solution not found.");
        assert!(outcome.report.is_none());
        assert_eq!(session.measurement_count(), 0);
    }

    #[test]
    fn failed_solve_keeps_prior_transforms() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ready_session(&dir);
        session.registry.register_lighthouse(&LighthouseCalibration {
            serial: "S".into(),
            ..Default::default()
        });
        let prior = [2.0, 0.0, 1.0, 0.0, 0.3, 0.0];
        session.registry.lighthouse_entry("S").vive_from_lighthouse = prior;

        session.trigger();
        let mut slave_only = light(6);
        slave_only.lighthouse = "S".into();
        assert!(session.handle_light(0.0, slave_only));
        let outcome = session.trigger();
        assert!(!outcome.success);
        assert_eq!(session.registry.master().unwrap().serial, "L");
        assert_eq!(session.registry.lighthouse("S").unwrap().vive_from_lighthouse, prior);
        assert!(!dir.path().join("cal.json").exists());
    }

    #[test]
    fn idle_trigger_fires_once_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.offline = true;
        let mut session = Session::new(cfg, NullSink).unwrap();
        assert!(session.is_recording());
        assert!(session.poll_idle(100.0).is_none(), "not armed before light");

        session.handle_light(10.0, light(6));
        assert!(session.poll_idle(10.5).is_none());
        let outcome = session.poll_idle(11.0).unwrap();
        assert!(!session.is_recording());
        assert!(!outcome.success);
        assert!(session.poll_idle(20.0).is_none());
    }

    #[test]
    fn startup_reads_calibration_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir);
        let mut file = CalibrationFile::default();
        file.lighthouses.insert("L".into(), [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        file.registration = [0.0, 0.0, 0.3, 0.0, 0.0, 0.0];
        file.write(&cfg.calfile).unwrap();

        let mut session = Session::new(cfg, Collect::default()).unwrap();
        assert_eq!(session.registration()[2], 0.3);
        assert!(session.registry().lighthouse("L").unwrap().ready);
        assert_eq!(session.sink().transforms.len(), 1);
        assert_eq!(session.sink().transforms[0][1].child, "L");

        session.register_tracker(dome_tracker("T", 5, 0.1));
        assert_eq!(session.sink().markers, 5);
        assert!(session.sink().trajectories.is_empty());
    }
}
