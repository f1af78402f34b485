//! Recording session and solve pipeline for lighthouse calibration.
//!
//! A [`Session`] owns everything a calibration run needs: the light-capture
//! decoder, the tracker and lighthouse registries, the measurement store and
//! the last solved transforms. Pulses go in through [`Session::handle_pulse`];
//! [`Session::trigger`] toggles recording and, when recording stops, runs
//!
//! 1. time binning of the recorded measurements,
//! 2. one PnP pose per (tracker, lighthouse, time bin),
//! 3. closed-form initialisation and nonlinear refinement of every
//!    `vive_from_lighthouse` transform,
//!
//! then persists the result to the calibration file and publishes it through
//! a [`ResultSink`].

pub mod calfile;
pub mod config;
pub mod poses;
pub mod publish;
pub mod registry;
mod session;
pub mod solve;
pub mod store;

pub use calfile::CalibrationFile;
pub use config::{EntityConfig, FrameNames, SessionConfig, SolverConfig, Thresholds};
pub use poses::{estimate_poses, PoseTable};
pub use publish::{FrameTransform, LogSink, NullSink, ResultSink, SensorMarker, Trajectory};
pub use registry::{LighthouseEntry, Registry, TrackerEntry};
pub use session::{Session, TriggerOutcome};
pub use solve::{solve_registration, SolveReport};
pub use store::{light_from_bundle, AcceptanceFilter, MeasurementStore, TimeBins};
