//! The solve pipeline run when recording stops.

use crate::config::SessionConfig;
use crate::poses::{estimate_poses, PoseTable};
use crate::registry::Registry;
use crate::store::TimeBins;
use anyhow::{bail, ensure, Result};
use lh_core::{iso3_to_vec6, vec6_to_iso3, Iso3, Light, Real, Transform6};
use lh_linear::{estimate_master_from_slave, PosePair};
use lh_optim::{optimize_lighthouse_registration, RegistrationDataset, SolveStatus};
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Summary of one solve.
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub measurements: usize,
    /// Seconds between the first and the last measurement.
    pub time_span: Real,
    /// Number of (tracker, lighthouse, time bin) cells.
    pub bins: usize,
    /// PnP poses per lighthouse.
    pub poses: BTreeMap<String, usize>,
    pub master: String,
    /// Solved `vive_from_lighthouse` per lighthouse; the master is identity.
    pub transforms: Vec<(String, Transform6)>,
    pub final_cost: f64,
    pub status: SolveStatus,
    pub iterations: usize,
    pub residual_blocks: usize,
}

/// A solve's report and the poses it was computed from.
#[derive(Debug, Clone)]
pub struct Solution {
    pub report: SolveReport,
    pub poses: PoseTable,
    pub resolution: Real,
}

/// Closed-form `master_from_slave` per slave; slaves sharing no epoch with
/// the master start from their configured priors.
fn initial_transforms(
    dataset: &RegistrationDataset,
    registry: &Registry,
) -> HashMap<String, Transform6> {
    let mut initial = HashMap::new();
    let Some(master) = dataset.master() else {
        return initial;
    };
    let prior = |serial: &str| {
        registry
            .lighthouse(serial)
            .map(|l| vec6_to_iso3(&l.vive_from_lighthouse))
            .unwrap_or_else(Iso3::identity)
    };
    let master_prior = prior(&master.serial);

    for slave in dataset.slaves() {
        let pairs: Vec<PosePair> = master
            .poses
            .iter()
            .filter_map(|(epoch, m_t)| {
                let s_t = slave.poses.get(epoch)?;
                Some(PosePair {
                    master_from_tracker: vec6_to_iso3(m_t),
                    slave_from_tracker: vec6_to_iso3(s_t),
                })
            })
            .collect();
        let start = match estimate_master_from_slave(&pairs) {
            Ok(iso) => iso,
            Err(err) => {
                debug!("lighthouse {}: {err}, starting from prior", slave.serial);
                master_prior.inverse() * prior(&slave.serial)
            }
        };
        initial.insert(slave.serial.clone(), iso3_to_vec6(&start));
    }
    initial
}

/// Bin `measurements`, estimate poses and register every lighthouse that has
/// poses against the first registered lighthouse. Fails when that master has
/// no poses.
pub fn solve_registration(
    measurements: &[(Real, Light)],
    registry: &Registry,
    config: &SessionConfig,
) -> Result<Solution> {
    if measurements.is_empty() {
        bail!("Insufficient measurements received, so cannot solve problem.");
    }
    let first = measurements
        .iter()
        .map(|(t, _)| *t)
        .fold(Real::INFINITY, Real::min);
    let last = measurements
        .iter()
        .map(|(t, _)| *t)
        .fold(Real::NEG_INFINITY, Real::max);
    info!(
        "Processing {} measurements running for {:.3} seconds from {:.3} to {:.3}",
        measurements.len(),
        last - first,
        first,
        last
    );

    info!("Bundling measurements into larger discrete time units.");
    let bins = TimeBins::new(measurements, config.resolution);

    info!("Using PnP to estimate pose sequence in every lighthouse frame.");
    let poses = estimate_poses(&bins, registry, config.correct);
    let dataset = poses.to_dataset(registry.lighthouses().iter().map(|l| l.serial.as_str()));
    let Some(master) = dataset.master() else {
        bail!("no lighthouse has been identified");
    };
    ensure!(
        !master.poses.is_empty(),
        "master lighthouse {} has no tracker poses, keeping the previous calibration",
        master.serial
    );
    let master = master.serial.clone();

    info!("Estimating master -> slave lighthouse transforms.");
    let initial = initial_transforms(&dataset, registry);
    let result = optimize_lighthouse_registration(&dataset, &initial, &config.solve_options())?;
    ensure!(
        result.is_usable(),
        "solution not usable (final cost {})",
        result.final_cost
    );
    info!("- Solution found");
    for (serial, t) in &result.transforms {
        let d = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
        info!("{serial}: {} {} {} ({d}m)", t[0], t[1], t[2]);
    }

    let report = SolveReport {
        measurements: measurements.len(),
        time_span: last - first,
        bins: bins.len(),
        poses: dataset
            .lighthouses
            .iter()
            .map(|l| (l.serial.clone(), l.poses.len()))
            .collect(),
        master,
        transforms: result.transforms,
        final_cost: result.final_cost,
        status: result.status,
        iterations: result.iterations,
        residual_blocks: result.residual_blocks,
    };
    Ok(Solution {
        report,
        poses,
        resolution: bins.resolution(),
    })
}
