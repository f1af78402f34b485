//! Multi-lighthouse registration.
//!
//! Every lighthouse observes the same trackers; a tracker epoch (tracker,
//! time bin) seen by the master and by a slave ties the two frames together.
//! The master (first lighthouse) is held at identity; each slave gets one free
//! 6D `master_from_slave` block. Per-epoch poses enter as fully fixed blocks.

use crate::backend::{BackendSolveOptions, TinySolverBackend};
use crate::ir::{BlockRole, ProblemIR, ResidualBlock, RobustLoss};
use crate::params::transform6::{dvec_to_transform6, transform6_to_dvec};
use anyhow::{anyhow, ensure, Context, Result};
use lh_core::{Transform6, IDENTITY6};
use log::{debug, info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// A tracker epoch: tracker serial and time-bin index.
pub type EpochKey = (String, i64);

/// PnP poses `lighthouse_from_tracker` of one lighthouse, per epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LighthousePoses {
    pub serial: String,
    pub poses: BTreeMap<EpochKey, Transform6>,
}

/// All lighthouses in insertion order; the first is the master.
#[derive(Debug, Clone, Default)]
pub struct RegistrationDataset {
    pub lighthouses: Vec<LighthousePoses>,
}

impl RegistrationDataset {
    pub fn master(&self) -> Option<&LighthousePoses> {
        self.lighthouses.first()
    }

    pub fn slaves(&self) -> &[LighthousePoses] {
        self.lighthouses.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationSolveOptions {
    pub robust_loss: RobustLoss,
    pub max_iterations: usize,
    /// Wall-clock budget, checked between iteration chunks.
    pub max_time: Duration,
    /// Worker threads for residual and Jacobian evaluation.
    pub threads: usize,
    /// Log per-chunk progress and enable solver output.
    pub debug: bool,
}

impl Default for RegistrationSolveOptions {
    fn default() -> Self {
        Self {
            robust_loss: RobustLoss::Huber { scale: 1.0 },
            max_iterations: 100,
            max_time: Duration::from_secs(10),
            threads: 1,
            debug: false,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Converged,
    IterationLimit,
    TimeLimit,
}

#[derive(Debug, Clone)]
pub struct RegistrationResult {
    /// `master_from_lighthouse` for every lighthouse, in dataset order. The
    /// master maps to identity.
    pub transforms: Vec<(String, Transform6)>,
    pub final_cost: f64,
    pub status: SolveStatus,
    pub iterations: usize,
    pub residual_blocks: usize,
}

impl RegistrationResult {
    /// A solution is usable when its cost is finite.
    pub fn is_usable(&self) -> bool {
        self.final_cost.is_finite()
    }

    pub fn transform(&self, serial: &str) -> Option<&Transform6> {
        self.transforms
            .iter()
            .find(|(s, _)| s == serial)
            .map(|(_, t)| t)
    }
}

fn slave_key(serial: &str) -> String {
    format!("lighthouse/{serial}")
}

fn pose_key(lighthouse: &str, epoch: &EpochKey) -> String {
    format!("pose/{lighthouse}/{}/{}", epoch.0, epoch.1)
}

/// Build the IR. `initial` supplies `master_from_slave` starting values;
/// slaves missing from it start at identity. Slaves sharing no epoch with the
/// master get no block.
pub fn build_lighthouse_registration_ir(
    dataset: &RegistrationDataset,
    initial: &HashMap<String, Transform6>,
    opts: &RegistrationSolveOptions,
) -> Result<(ProblemIR, HashMap<String, DVector<f64>>)> {
    let master = dataset
        .master()
        .ok_or_else(|| anyhow!("registration needs at least one lighthouse"))?;

    let mut ir = ProblemIR::new();
    let mut initial_map = HashMap::new();
    let mut pose_ids = HashMap::new();

    let mut pose_block = |ir: &mut ProblemIR, lighthouse: &str, epoch: &EpochKey, pose: &Transform6| {
        let key = pose_key(lighthouse, epoch);
        *pose_ids.entry(key.clone()).or_insert_with(|| {
            initial_map.insert(key.clone(), transform6_to_dvec(pose));
            ir.add_param_block(key, BlockRole::EpochPose)
        })
    };

    let mut slave_values = Vec::new();
    for slave in dataset.slaves() {
        ensure!(
            slave.serial != master.serial,
            "lighthouse {} listed twice",
            slave.serial
        );
        let shared: Vec<(&EpochKey, &Transform6, &Transform6)> = master
            .poses
            .iter()
            .filter_map(|(epoch, m_t)| slave.poses.get(epoch).map(|s_t| (epoch, m_t, s_t)))
            .collect();
        if shared.is_empty() {
            warn!(
                "lighthouse {} shares no epoch with master {}, keeping its prior",
                slave.serial, master.serial
            );
            continue;
        }

        let key = slave_key(&slave.serial);
        let slave_id = ir.add_param_block(&key, BlockRole::SlaveTransform);
        let start = initial.get(&slave.serial).copied().unwrap_or(IDENTITY6);
        slave_values.push((key, transform6_to_dvec(&start)));

        for (epoch, m_t, s_t) in shared {
            let m_id = pose_block(&mut ir, &master.serial, epoch, m_t);
            let s_id = pose_block(&mut ir, &slave.serial, epoch, s_t);
            ir.add_residual_block(ResidualBlock {
                master_from_slave: slave_id,
                master_from_tracker: m_id,
                slave_from_tracker: s_id,
                loss: opts.robust_loss,
            });
        }
    }
    initial_map.extend(slave_values);

    ir.validate()?;
    Ok((ir, initial_map))
}

const ITERATION_CHUNK: usize = 10;
const MIN_RELATIVE_DECREASE: f64 = 1e-12;

/// Solve for `master_from_slave` of every slave.
///
/// Returns an error when the backend fails outright; callers treat that, or a
/// non-finite cost, as "no solution" and keep their previous values.
pub fn optimize_lighthouse_registration(
    dataset: &RegistrationDataset,
    initial: &HashMap<String, Transform6>,
    opts: &RegistrationSolveOptions,
) -> Result<RegistrationResult> {
    let (ir, mut params) = build_lighthouse_registration_ir(dataset, initial, opts)?;
    let residual_blocks = ir.residuals.len();

    let mut iterations = 0;
    let mut status = SolveStatus::Converged;
    let mut final_cost = 0.0;

    if residual_blocks > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.threads.max(1))
            .build()
            .context("failed to build solver thread pool")?;
        let backend = TinySolverBackend;
        let started = Instant::now();
        final_cost = backend.evaluate(&ir, &params)?;
        info!(
            "solving {} residual blocks over {} parameter blocks, initial cost {:.6e}",
            residual_blocks,
            ir.params.len(),
            final_cost
        );

        status = SolveStatus::IterationLimit;
        while iterations < opts.max_iterations {
            if started.elapsed() >= opts.max_time {
                status = SolveStatus::TimeLimit;
                break;
            }
            let chunk = ITERATION_CHUNK.min(opts.max_iterations - iterations);
            let backend_opts = BackendSolveOptions {
                max_iters: chunk,
                verbosity: usize::from(opts.debug),
                ..BackendSolveOptions::default()
            };
            let solution = pool.install(|| backend.solve(&ir, &params, &backend_opts))?;
            iterations += chunk;
            let previous = final_cost;
            params = solution.params;
            final_cost = solution.final_cost;
            if opts.debug {
                debug!("after {iterations} iterations: cost {final_cost:.6e}");
            }
            if !final_cost.is_finite() || previous - final_cost <= MIN_RELATIVE_DECREASE * previous {
                status = SolveStatus::Converged;
                break;
            }
        }
    }

    let mut transforms = Vec::with_capacity(dataset.lighthouses.len());
    for (idx, lh) in dataset.lighthouses.iter().enumerate() {
        let t = if idx == 0 {
            IDENTITY6
        } else if let Some(v) = params.get(&slave_key(&lh.serial)) {
            dvec_to_transform6(v.as_view())?
        } else {
            initial.get(&lh.serial).copied().unwrap_or(IDENTITY6)
        };
        transforms.push((lh.serial.clone(), t));
    }

    Ok(RegistrationResult {
        transforms,
        final_cost,
        status,
        iterations,
        residual_blocks,
    })
}
