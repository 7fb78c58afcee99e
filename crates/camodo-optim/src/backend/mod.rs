//! Solver-backend boundary.
//!
//! The graph builders in [`crate::problems`] describe the calibration as an
//! IR and hand it to a [`BackendKind`]; the adapter behind it owns every
//! detail of the nonlinear-least-squares library (manifold registration,
//! fixing, stopping rules) and answers with a plain name-to-vector map.
//! Swapping the library means writing one new adapter, nothing upstream
//! changes.

mod tiny_solver_backend;

use anyhow::Result;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ir::ProblemIR;

pub use tiny_solver_backend::TinySolverBackend;

/// Sparse linear solver used inside each Levenberg-Marquardt step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SparseSolver {
    /// Sparse Cholesky; the default for the well-conditioned calibration
    /// normal equations.
    #[default]
    Cholesky,
    /// Sparse QR, for problems where Cholesky pivoting struggles.
    Qr,
}

/// Early-termination thresholds, checked after every accepted step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopCriteria {
    /// Stop once an iteration improves the cost by less than this amount.
    pub abs_decrease: f64,
    /// Stop once the relative improvement falls below this fraction.
    pub rel_decrease: f64,
    /// Stop outright when the cost itself drops under this floor.
    pub cost_floor: f64,
}

impl Default for StopCriteria {
    fn default() -> Self {
        Self {
            abs_decrease: 1e-8,
            rel_decrease: 1e-8,
            cost_floor: 1e-12,
        }
    }
}

/// Everything a backend needs to know about how long and how hard to try.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSolveOptions {
    /// Hard cap on Levenberg-Marquardt iterations.
    pub max_iters: usize,
    /// Per-iteration chatter from the backend; 0 keeps it quiet.
    pub verbosity: usize,
    /// Linear solver for the normal equations.
    pub linear_solver: SparseSolver,
    /// Convergence thresholds.
    pub stop: StopCriteria,
}

impl Default for BackendSolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            verbosity: 0,
            linear_solver: SparseSolver::default(),
            stop: StopCriteria::default(),
        }
    }
}

/// What comes back from a solve: the optimized block vectors, keyed by the
/// same names the IR assigned, and the cost `0.5 * ||r||^2` at the final
/// iterate.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    pub params: HashMap<String, DVector<f64>>,
    pub final_cost: f64,
}

/// One nonlinear-least-squares library, wrapped.
///
/// `solve` receives a validated IR plus the initial block values and must
/// either return estimates for every free block or an error; partial
/// results are not a thing at this boundary.
pub trait OptimBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution>;
}

/// The backends this workspace ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Levenberg-Marquardt from the `tiny-solver` crate.
    #[default]
    TinySolver,
}

impl BackendKind {
    /// Dispatch a solve to the adapter for this backend.
    pub fn solve(
        self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        match self {
            BackendKind::TinySolver => TinySolverBackend.solve(ir, initial, opts),
        }
    }
}
