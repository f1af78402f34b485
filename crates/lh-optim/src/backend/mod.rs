//! Compiles the IR into a tiny-solver problem and runs it.

mod tiny_solver_backend;

use nalgebra::DVector;
use std::collections::HashMap;

pub use tiny_solver_backend::TinySolverBackend;

/// Options for one Levenberg-Marquardt run.
#[derive(Debug, Clone)]
pub struct BackendSolveOptions {
    pub max_iters: usize,
    /// tiny-solver verbosity level.
    pub verbosity: usize,
    /// Stop when the cost drops by less than this.
    pub min_abs_decrease: f64,
    /// Stop when the cost drops by less than this fraction.
    pub min_rel_decrease: f64,
    /// Stop when the cost falls below this.
    pub min_error: f64,
}

impl Default for BackendSolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            verbosity: 0,
            min_abs_decrease: 1e-10,
            min_rel_decrease: 1e-10,
            min_error: 1e-16,
        }
    }
}

/// Parameter values keyed by IR block name, and the robustified cost.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    pub params: HashMap<String, DVector<f64>>,
    pub final_cost: f64,
}
