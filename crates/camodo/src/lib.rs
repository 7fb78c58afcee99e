//! High-level entry crate for the `camodo-rs` toolbox.
//!
//! `camodo` calibrates the rigid transform between a ground robot's base
//! frame and a camera mounted on it, from two synchronized streams: planar
//! wheel odometry and camera observations of fiducial markers (or, in the
//! visual variant, triangulated feature tracks).
//!
//! A typical marker run:
//!
//! ```ignore
//! use camodo::prelude::*;
//!
//! let mut dataset: Dataset = /* keyframes + marker observations */;
//! let cfg = SolverConfig::default();
//!
//! // Closed-form seed, then joint refinement (with fallback to the
//! // configured extrinsic when the trajectory is degenerate).
//! let x_bc = calibrate_marker_dataset(&mut dataset, &cfg)?;
//! ```
//!
//! Or stage by stage:
//!
//! ```ignore
//! use camodo::pipeline::{CalibSolver, MarkerInitSolver, MarkerOptimSolver};
//!
//! let seed = MarkerInitSolver::new(cfg.clone()).calibrate(&mut dataset)?;
//! let refined = MarkerOptimSolver::with_extrinsic(cfg, seed).calibrate(&mut dataset)?;
//! ```
//!
//! ## Module organization
//!
//! - [`core`]: planar/3D pose types, dataset entities, camera model,
//!   configuration, synthetic scenes
//! - [`linear`]: closed-form initializers and the match filter
//! - [`optim`]: factor-graph IR and the tiny-solver backend
//! - [`pipeline`]: the solver drivers

/// Core math types, dataset entities, and configuration.
pub mod core {
    pub use camodo_core::*;
}

/// Closed-form initialization algorithms.
pub mod linear {
    pub use camodo_linear::*;
}

/// Nonlinear joint optimization.
pub mod optim {
    pub use camodo_optim::*;
}

/// Calibration drivers.
pub mod pipeline {
    pub use camodo_pipeline::*;
}

/// Deterministic synthetic scene generation.
pub mod synthetic {
    pub use camodo_core::synthetic::*;
}

// Re-exports for convenience
pub use camodo_core::{CalibError, CalibResult, CameraModel, Dataset, Iso3, Se2, SolverConfig};
pub use camodo_pipeline::{calibrate_marker_dataset, CalibSolver};

/// Convenient re-exports for common use cases.
pub mod prelude {
    pub use crate::core::{
        CalibError, CalibResult, CameraModel, Dataset, Iso3, Keyframe, KfId, Landmark, LmId,
        Pt2, Pt3, Se2, SolverConfig, Vec2, Vec3,
    };
    pub use crate::pipeline::{
        calibrate_marker_dataset, CalibSolver, MarkerInitSolver, MarkerOptimSolver,
        VisualOptimSolver,
    };
}
