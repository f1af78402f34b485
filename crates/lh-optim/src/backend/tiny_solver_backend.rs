use super::{BackendSolution, BackendSolveOptions};
use crate::factors::transform::lighthouse_transform_residual_generic;
use crate::ir::{ProblemIR, ResidualBlock, RobustLoss, BLOCK_DIM};
use anyhow::{anyhow, ensure, Result};
use nalgebra::DVector;
use std::collections::HashMap;
use tiny_solver::factors::Factor;
use tiny_solver::loss_functions::{HuberLoss, Loss};
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

/// Levenberg-Marquardt on sparse Cholesky normal equations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TinySolverBackend;

impl TinySolverBackend {
    fn compile(&self, ir: &ProblemIR, initial: &HashMap<String, DVector<f64>>) -> Result<Problem> {
        ir.validate()?;

        let mut problem = Problem::new();
        for param in &ir.params {
            let init = initial
                .get(&param.name)
                .ok_or_else(|| anyhow!("initial values missing block {}", param.name))?;
            ensure!(
                init.len() == BLOCK_DIM,
                "block {} has {} values, expected {BLOCK_DIM}",
                param.name,
                init.len()
            );
            if param.is_constant() {
                for idx in 0..BLOCK_DIM {
                    problem.fix_variable(&param.name, idx);
                }
            }
        }

        for residual in &ir.residuals {
            let names = residual.params().map(|id| ir.params[id.0].name.as_str());
            problem.add_residual_block(
                ResidualBlock::DIM,
                &names,
                Box::new(TinyLighthouseTransformFactor),
                compile_loss(residual.loss)?,
            );
        }
        Ok(problem)
    }

    /// Run the optimizer from `initial`.
    pub fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        let problem = self.compile(ir, initial)?;
        let optimizer = LevenbergMarquardtOptimizer::default();
        let solution = optimizer
            .optimize(&problem, initial, Some(to_optimizer_options(opts)))
            .ok_or_else(|| anyhow!("tiny-solver failed to converge"))?;

        let final_cost = cost_of(&problem, &solution);
        Ok(BackendSolution {
            params: solution,
            final_cost,
        })
    }

    /// Robustified cost of the IR at `params`.
    pub fn evaluate(&self, ir: &ProblemIR, params: &HashMap<String, DVector<f64>>) -> Result<f64> {
        let problem = self.compile(ir, params)?;
        Ok(cost_of(&problem, params))
    }
}

fn cost_of(problem: &Problem, params: &HashMap<String, DVector<f64>>) -> f64 {
    let param_blocks = problem.initialize_parameter_blocks(params);
    let residuals = problem.compute_residuals(&param_blocks, true);
    0.5 * residuals.as_ref().squared_norm_l2()
}

fn to_optimizer_options(opts: &BackendSolveOptions) -> OptimizerOptions {
    OptimizerOptions {
        max_iteration: opts.max_iters,
        verbosity_level: opts.verbosity,
        linear_solver_type: LinearSolverType::SparseCholesky,
        min_abs_error_decrease_threshold: opts.min_abs_decrease,
        min_rel_error_decrease_threshold: opts.min_rel_decrease,
        min_error_threshold: opts.min_error,
        ..OptimizerOptions::default()
    }
}

fn compile_loss(loss: RobustLoss) -> Result<Option<Box<dyn Loss + Send>>> {
    match loss {
        RobustLoss::None => Ok(None),
        RobustLoss::Huber { scale } => {
            ensure!(scale > 0.0, "Huber scale must be positive");
            Ok(Some(Box::new(HuberLoss::new(scale))))
        }
    }
}

#[derive(Debug, Clone)]
struct TinyLighthouseTransformFactor;

impl<T: nalgebra::RealField> Factor<T> for TinyLighthouseTransformFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(
            params.len(),
            3,
            "expected [master_from_slave, master_from_tracker, slave_from_tracker] parameter blocks"
        );
        let r = lighthouse_transform_residual_generic(
            params[0].as_view(),
            params[1].as_view(),
            params[2].as_view(),
        );
        DVector::from_row_slice(r.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BlockRole;

    fn single_epoch(slave_start: [f64; 6]) -> (ProblemIR, HashMap<String, DVector<f64>>) {
        let mut ir = ProblemIR::new();
        let slave = ir.add_param_block("slave", BlockRole::SlaveTransform);
        let m = ir.add_param_block("m", BlockRole::EpochPose);
        let s = ir.add_param_block("s", BlockRole::EpochPose);
        ir.add_residual_block(ResidualBlock {
            master_from_slave: slave,
            master_from_tracker: m,
            slave_from_tracker: s,
            loss: RobustLoss::None,
        });
        let values = HashMap::from([
            ("slave".to_string(), DVector::from_row_slice(&slave_start)),
            (
                "m".to_string(),
                DVector::from_row_slice(&[1.0, 0.0, 2.0, 0.0, 0.0, 0.0]),
            ),
            (
                "s".to_string(),
                DVector::from_row_slice(&[0.0, 0.0, 2.0, 0.0, 0.0, 0.0]),
            ),
        ]);
        (ir, values)
    }

    #[test]
    fn solve_moves_only_the_slave() {
        let (ir, values) = single_epoch([0.0; 6]);
        let backend = TinySolverBackend;
        assert!(backend.evaluate(&ir, &values).unwrap() > 0.4);

        let solution = backend
            .solve(&ir, &values, &BackendSolveOptions::default())
            .unwrap();
        assert!(solution.final_cost < 1e-8);
        assert!((solution.params["slave"][0] - 1.0).abs() < 1e-4);
        for held in ["m", "s"] {
            assert!((&solution.params[held] - &values[held]).norm() < 1e-12);
        }
    }

    #[test]
    fn missing_initial_value_is_an_error() {
        let (ir, mut values) = single_epoch([0.0; 6]);
        values.remove("s");
        assert!(TinySolverBackend.evaluate(&ir, &values).is_err());
    }
}
