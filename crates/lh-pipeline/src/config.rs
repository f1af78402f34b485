//! Session configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it changes.

use anyhow::{ensure, Context, Result};
use lh_core::{iso3_to_vec6, pose7_to_iso3, Real, Transform6};
use lh_optim::RegistrationSolveOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Names of the frames the calibration is published in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameNames {
    pub world: String,
    /// Frame of the master lighthouse.
    pub vive: String,
    pub body: String,
}

impl Default for FrameNames {
    fn default() -> Self {
        Self {
            world: "world".into(),
            vive: "vive".into(),
            body: "body".into(),
        }
    }
}

/// Measurement acceptance thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum number of pulses a bundle must keep after filtering.
    pub count: usize,
    /// Maximum absolute sweep angle, degrees.
    pub angle: Real,
    /// Minimum pulse duration, microseconds.
    pub duration: Real,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            count: 4,
            angle: 60.0,
            duration: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock budget, seconds.
    pub max_time: Real,
    pub max_iterations: usize,
    pub threads: usize,
    pub debug: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_time: 10.0,
            max_iterations: 100,
            threads: 1,
            debug: false,
        }
    }
}

/// A configured lighthouse or tracker and its prior transform
/// `[x, y, z, qx, qy, qz, qw]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub serial: String,
    pub transform: Vec<Real>,
}

impl EntityConfig {
    /// The configured transform as `[tx, ty, tz, rx, ry, rz]`.
    pub fn transform6(&self) -> Result<Transform6> {
        let iso = pose7_to_iso3(&self.transform)
            .with_context(|| format!("invalid transform for {}", self.serial))?;
        Ok(iso3_to_vec6(&iso))
    }
}

/// Configuration of a calibration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Persistence and frames
    // ─────────────────────────────────────────────────────────────────────────
    /// Calibration file read at start and written after every successful solve.
    pub calfile: PathBuf,
    pub frames: FrameNames,

    // ─────────────────────────────────────────────────────────────────────────
    // Measurement handling
    // ─────────────────────────────────────────────────────────────────────────
    pub thresholds: Thresholds,
    /// Time-bin width, seconds.
    pub resolution: Real,
    /// Apply the lighthouse's own angle corrections before PnP.
    pub correct: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // Solver
    // ─────────────────────────────────────────────────────────────────────────
    pub solver: SolverConfig,

    // ─────────────────────────────────────────────────────────────────────────
    // Session behaviour
    // ─────────────────────────────────────────────────────────────────────────
    /// Start recording immediately (log replay).
    pub offline: bool,
    /// Compute trajectory and sensor-marker projections.
    pub visualize: bool,
    /// Seconds without light before recording is stopped automatically.
    pub idle_timeout: Real,

    // ─────────────────────────────────────────────────────────────────────────
    // Known entities
    // ─────────────────────────────────────────────────────────────────────────
    /// Prior `vive_from_lighthouse` transforms.
    pub lighthouses: Vec<EntityConfig>,
    /// `body_from_tracker` transforms.
    pub trackers: Vec<EntityConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            calfile: PathBuf::from("deepdive.json"),
            frames: FrameNames::default(),
            thresholds: Thresholds::default(),
            resolution: 0.1,
            correct: false,
            solver: SolverConfig::default(),
            offline: false,
            visualize: true,
            idle_timeout: 1.0,
            lighthouses: Vec::new(),
            trackers: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Load a JSON configuration file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.resolution > 0.0 && self.resolution.is_finite(),
            "resolution must be positive, got {}",
            self.resolution
        );
        ensure!(
            self.idle_timeout > 0.0,
            "idle_timeout must be positive, got {}",
            self.idle_timeout
        );
        ensure!(
            self.solver.max_time > 0.0 && self.solver.max_time.is_finite(),
            "solver.max_time must be positive, got {}",
            self.solver.max_time
        );
        for entity in self.lighthouses.iter().chain(&self.trackers) {
            entity.transform6()?;
        }
        Ok(())
    }

    /// Solver options for lighthouse registration.
    pub fn solve_options(&self) -> RegistrationSolveOptions {
        RegistrationSolveOptions {
            max_iterations: self.solver.max_iterations,
            max_time: Duration::from_secs_f64(self.solver.max_time.max(0.0)),
            threads: self.solver.threads,
            debug: self.solver.debug,
            ..RegistrationSolveOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"resolution": 0.25, "thresholds": {"count": 6}}"#).unwrap();
        assert_eq!(config.resolution, 0.25);
        assert_eq!(config.thresholds.count, 6);
        assert_eq!(config.thresholds.angle, 60.0);
        assert_eq!(config.calfile, PathBuf::from("deepdive.json"));
        assert_eq!(config.frames.vive, "vive");
        assert!(config.visualize);
        assert!(!config.offline);
    }

    #[test]
    fn entity_transform_converts_quaternion() {
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let entity = EntityConfig {
            serial: "LHB".into(),
            transform: vec![1.0, 2.0, 3.0, 0.0, 0.0, half, half],
        };
        let t = entity.transform6().unwrap();
        assert_eq!(&t[..3], &[1.0, 2.0, 3.0]);
        assert!((t[5] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!(t[3].abs() < 1e-12 && t[4].abs() < 1e-12);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = SessionConfig::default();
        assert!(config.validate().is_ok());
        config.resolution = 0.0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.trackers.push(EntityConfig {
            serial: "T".into(),
            transform: vec![0.0; 6],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn solve_options_follow_solver_section() {
        let mut config = SessionConfig::default();
        config.solver.max_time = 2.5;
        config.solver.threads = 4;
        let opts = config.solve_options();
        assert_eq!(opts.max_time, Duration::from_millis(2500));
        assert_eq!(opts.threads, 4);
        assert_eq!(opts.max_iterations, 100);
    }

    #[test]
    fn config_file_round_trips() {
        let mut config = SessionConfig::default();
        config.offline = true;
        config.lighthouses.push(EntityConfig {
            serial: "LHA".into(),
            transform: vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        });
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = SessionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
