//! Calibration drivers for `camodo-rs`.
//!
//! The three solver variants share the odometry pipeline and the
//! refresh/bootstrap stages and differ in how they constrain the extrinsic:
//! - [`MarkerInitSolver`]: closed-form initialization from ground-plane
//!   geometry and odometry/marker hyper-edges,
//! - [`MarkerOptimSolver`]: joint graph refinement over 3D marker
//!   observations,
//! - [`VisualOptimSolver`]: joint graph refinement over 2D map-point
//!   reprojections bootstrapped from feature matches.
//!
//! All of them implement [`CalibSolver`]: borrow the dataset mutably for
//! the run, write refined estimates back, return the extrinsic.

pub mod odometry;
pub mod refresh;
pub mod solvers;
pub mod visual;

pub use odometry::build_odo_edges;
pub use refresh::{refresh_all_poses, refresh_kf_poses, refresh_mark_poses};
pub use solvers::{
    calibrate_marker_dataset, CalibSolver, MarkerInitSolver, MarkerOptimSolver, VisualOptimSolver,
};
pub use visual::{create_map_points, FeatureMatcher};
