//! Nonlinear refinement for `camodo-rs`.
//!
//! The optimizer is split along a backend boundary, mirroring the rest of
//! the workspace's separation of concerns:
//! - [`ir`] is a backend-agnostic problem description (parameter blocks,
//!   residual blocks, factor kinds),
//! - [`factors`] hosts the residual models, generic over the scalar so the
//!   backend can differentiate them automatically,
//! - [`backend`] compiles the IR into a tiny-solver Levenberg-Marquardt
//!   problem,
//! - [`problems`] builds the joint calibration graphs from a dataset and
//!   writes the refined estimates back.

pub mod backend;
pub mod factors;
pub mod ir;
pub mod params;
pub mod problems;

pub use backend::{
    BackendKind, BackendSolution, BackendSolveOptions, OptimBackend, SparseSolver, StopCriteria,
};
pub use ir::{FactorKind, FixedMask, ManifoldKind, ParamId, ProblemIR, ResidualBlock};
pub use problems::joint_graph::{
    build_marker_ir, build_visual_ir, optimize_marker_graph, optimize_visual_graph,
};
