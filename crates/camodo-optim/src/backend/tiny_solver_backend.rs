//! tiny-solver adapter.
//!
//! Translates the IR into a `tiny_solver::problem::Problem`: the extrinsic
//! block gets the SE(3) manifold, keyframe poses and landmark points stay
//! Euclidean, fixed entries are pinned one index at a time, and the three
//! calibration factors are registered as autodiff residual closures.

use anyhow::{anyhow, bail, ensure, Result};
use nalgebra::DVector;
use std::collections::HashMap;
use std::sync::Arc;
use tiny_solver::factors::Factor;
use tiny_solver::manifold::se3::SE3Manifold;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

use crate::backend::{
    BackendSolution, BackendSolveOptions, OptimBackend, SparseSolver,
};
use crate::factors::{
    mark_point3_residual_generic, odo_se2_residual_generic, reproj_uv_residual_generic,
};
use crate::ir::{FactorKind, ManifoldKind, ProblemIR};

/// Adapter for the `tiny-solver` Levenberg-Marquardt implementation.
#[derive(Debug, Clone, Copy)]
pub struct TinySolverBackend;

/// Register every IR block with the problem: seed value, manifold, pins.
fn install_blocks(
    problem: &mut Problem,
    ir: &ProblemIR,
    initial: &HashMap<String, DVector<f64>>,
) -> Result<()> {
    for block in &ir.params {
        let seed = initial
            .get(&block.name)
            .ok_or_else(|| anyhow!("block `{}` has no seed value", block.name))?;
        ensure!(
            seed.len() == block.dim,
            "block `{}` holds {} values but was seeded with {}",
            block.name,
            block.dim,
            seed.len()
        );

        match block.manifold {
            ManifoldKind::SE3 if block.fixed.is_empty() => {
                problem.set_variable_manifold(&block.name, Arc::new(SE3Manifold));
            }
            ManifoldKind::SE3 if !block.fixed.is_all_fixed(block.dim) => {
                // tiny-solver can pin a whole manifold block or none of it.
                bail!(
                    "extrinsic block `{}` must be fixed entirely or left free",
                    block.name
                );
            }
            _ => {}
        }

        for idx in block.fixed.iter() {
            problem.fix_variable(&block.name, idx);
        }
    }
    Ok(())
}

/// Attach one residual closure per IR residual block.
fn install_residuals(problem: &mut Problem, ir: &ProblemIR) {
    for residual in &ir.residuals {
        let names: Vec<&str> = residual
            .params
            .iter()
            .map(|id| ir.params[id.0].name.as_str())
            .collect();
        let dim = residual.factor.residual_dim();
        match &residual.factor {
            FactorKind::OdoSe2 { meas, sqrt_info } => problem.add_residual_block(
                dim,
                &names,
                Box::new(TinyOdoSe2Factor {
                    meas: *meas,
                    sqrt_info: *sqrt_info,
                }),
                None,
            ),
            FactorKind::MarkPoint3 { meas, sqrt_info } => problem.add_residual_block(
                dim,
                &names,
                Box::new(TinyMarkPoint3Factor {
                    meas: *meas,
                    sqrt_info: *sqrt_info,
                }),
                None,
            ),
            FactorKind::ReprojUv {
                uv,
                cam,
                sqrt_info,
            } => problem.add_residual_block(
                dim,
                &names,
                Box::new(TinyReprojUvFactor {
                    uv: *uv,
                    cam: *cam,
                    sqrt_info: *sqrt_info,
                }),
                None,
            ),
        };
    }
}

fn optimizer_options(opts: &BackendSolveOptions) -> OptimizerOptions {
    OptimizerOptions {
        max_iteration: opts.max_iters,
        verbosity_level: opts.verbosity,
        linear_solver_type: match opts.linear_solver {
            SparseSolver::Cholesky => LinearSolverType::SparseCholesky,
            SparseSolver::Qr => LinearSolverType::SparseQR,
        },
        min_abs_error_decrease_threshold: opts.stop.abs_decrease,
        min_rel_error_decrease_threshold: opts.stop.rel_decrease,
        min_error_threshold: opts.stop.cost_floor,
        ..OptimizerOptions::default()
    }
}

impl OptimBackend for TinySolverBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        ir.validate()?;

        let mut problem = Problem::new();
        install_blocks(&mut problem, ir, initial)?;
        install_residuals(&mut problem, ir);

        let optimizer = LevenbergMarquardtOptimizer::default();
        let solution = optimizer
            .optimize(&problem, initial, Some(optimizer_options(opts)))
            .ok_or_else(|| anyhow!("the Levenberg-Marquardt run produced no estimate"))?;

        let blocks = problem.initialize_parameter_blocks(&solution);
        let residuals = problem.compute_residuals(&blocks, true);
        let final_cost = 0.5 * residuals.as_ref().squared_norm_l2();
        ensure!(
            final_cost.is_finite(),
            "the solve ended on a non-finite cost"
        );

        Ok(BackendSolution {
            params: solution,
            final_cost,
        })
    }
}

#[derive(Debug, Clone)]
struct TinyOdoSe2Factor {
    meas: [f64; 3],
    sqrt_info: [f64; 9],
}

impl<T: nalgebra::RealField> Factor<T> for TinyOdoSe2Factor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 2, "expected [head, tail] parameter blocks");
        let r = odo_se2_residual_generic(
            params[0].as_view(),
            params[1].as_view(),
            self.meas,
            self.sqrt_info,
        );
        DVector::from_row_slice(r.as_slice())
    }
}

#[derive(Debug, Clone)]
struct TinyMarkPoint3Factor {
    meas: [f64; 3],
    sqrt_info: [f64; 9],
}

impl<T: nalgebra::RealField> Factor<T> for TinyMarkPoint3Factor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 3, "expected [extr, kf, lm] parameter blocks");
        let r = mark_point3_residual_generic(
            params[0].as_view(),
            params[1].as_view(),
            params[2].as_view(),
            self.meas,
            self.sqrt_info,
        );
        DVector::from_row_slice(r.as_slice())
    }
}

#[derive(Debug, Clone)]
struct TinyReprojUvFactor {
    uv: [f64; 2],
    cam: [f64; 4],
    sqrt_info: [f64; 4],
}

impl<T: nalgebra::RealField> Factor<T> for TinyReprojUvFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 3, "expected [extr, kf, lm] parameter blocks");
        let r = reproj_uv_residual_generic(
            params[0].as_view(),
            params[1].as_view(),
            params[2].as_view(),
            self.uv,
            self.cam,
            self.sqrt_info,
        );
        DVector::from_row_slice(r.as_slice())
    }
}
