//! The calibration solver variants.

use log::{info, warn};

use camodo_core::{CalibError, CalibResult, Dataset, Iso3, SolverConfig};
use camodo_linear::initialize_extrinsic;
use camodo_optim::{optimize_marker_graph, optimize_visual_graph, BackendSolveOptions};

use crate::odometry::build_odo_edges;
use crate::refresh::{refresh_all_poses, refresh_kf_poses};
use crate::visual::{create_map_points, FeatureMatcher};

/// One calibration run over a borrowed dataset.
///
/// Implementations write refined poses/positions back into the dataset and
/// return the estimated extrinsic (camera pose in the base frame).
pub trait CalibSolver {
    fn calibrate(&mut self, ds: &mut Dataset) -> CalibResult<Iso3>;
}

/// Closed-form marker initializer.
///
/// Builds odometry edges, recovers the extrinsic from ground-plane geometry
/// and hyper-edges, then refreshes camera poses and landmark seeds through
/// the estimate.
#[derive(Debug, Clone)]
pub struct MarkerInitSolver {
    pub cfg: SolverConfig,
}

impl MarkerInitSolver {
    pub fn new(cfg: SolverConfig) -> Self {
        Self { cfg }
    }
}

impl CalibSolver for MarkerInitSolver {
    fn calibrate(&mut self, ds: &mut Dataset) -> CalibResult<Iso3> {
        build_odo_edges(ds, &self.cfg.odo)?;
        let x_bc = initialize_extrinsic(ds, &self.cfg.init)?;
        refresh_all_poses(ds, &x_bc);
        info!("marker init: extrinsic t = {:?}", x_bc.translation.vector);
        Ok(x_bc)
    }
}

/// Joint marker-graph refinement from a seed extrinsic.
#[derive(Debug, Clone)]
pub struct MarkerOptimSolver {
    pub cfg: SolverConfig,
    x_bc: Iso3,
}

impl MarkerOptimSolver {
    /// Seed from the configured fallback extrinsic.
    pub fn new(cfg: SolverConfig) -> Self {
        let x_bc = cfg.initial_extrinsic();
        Self { cfg, x_bc }
    }

    /// Seed from a caller-provided extrinsic (e.g. the initializer's output).
    pub fn with_extrinsic(cfg: SolverConfig, x_bc: Iso3) -> Self {
        Self { cfg, x_bc }
    }

    pub fn extrinsic(&self) -> Iso3 {
        self.x_bc
    }
}

impl CalibSolver for MarkerOptimSolver {
    fn calibrate(&mut self, ds: &mut Dataset) -> CalibResult<Iso3> {
        build_odo_edges(ds, &self.cfg.odo)?;
        refresh_all_poses(ds, &self.x_bc);

        let opts = BackendSolveOptions {
            max_iters: self.cfg.optim.max_iter_marker,
            verbosity: self.cfg.optim.verbosity,
            ..Default::default()
        };
        let refined = optimize_marker_graph(ds, &self.x_bc, &opts)?;
        self.x_bc = refined;
        Ok(refined)
    }
}

/// Joint visual-graph refinement: map points are bootstrapped from feature
/// matches, then the extrinsic, keyframe poses, and map points are refined
/// against 2D reprojections.
pub struct VisualOptimSolver<'m> {
    pub cfg: SolverConfig,
    matcher: &'m dyn FeatureMatcher,
    x_bc: Iso3,
}

impl<'m> VisualOptimSolver<'m> {
    pub fn new(cfg: SolverConfig, matcher: &'m dyn FeatureMatcher) -> Self {
        let x_bc = cfg.initial_extrinsic();
        Self {
            cfg,
            matcher,
            x_bc,
        }
    }

    pub fn with_extrinsic(cfg: SolverConfig, matcher: &'m dyn FeatureMatcher, x_bc: Iso3) -> Self {
        Self {
            cfg,
            matcher,
            x_bc,
        }
    }
}

impl CalibSolver for VisualOptimSolver<'_> {
    fn calibrate(&mut self, ds: &mut Dataset) -> CalibResult<Iso3> {
        build_odo_edges(ds, &self.cfg.odo)?;
        refresh_kf_poses(ds, &self.x_bc);
        create_map_points(ds, self.matcher, &self.cfg.visual)?;

        let opts = BackendSolveOptions {
            max_iters: self.cfg.optim.max_iter_visual,
            verbosity: self.cfg.optim.verbosity,
            ..Default::default()
        };
        let refined = optimize_visual_graph(ds, &self.x_bc, &opts)?;
        self.x_bc = refined;
        Ok(refined)
    }
}

/// Full marker calibration: closed-form init, falling back to the
/// configured extrinsic on degenerate geometry, then joint refinement.
pub fn calibrate_marker_dataset(ds: &mut Dataset, cfg: &SolverConfig) -> CalibResult<Iso3> {
    let seed = match MarkerInitSolver::new(cfg.clone()).calibrate(ds) {
        Ok(x) => x,
        Err(CalibError::DegenerateGeometry(reason)) => {
            warn!(
                "initializer degenerate ({}); falling back to the configured extrinsic",
                reason
            );
            cfg.initial_extrinsic()
        }
        Err(other) => return Err(other),
    };
    MarkerOptimSolver::with_extrinsic(cfg.clone(), seed).calibrate(ds)
}
