//! Closed-form estimation for `camodo-rs`.
//!
//! This crate hosts the linear stages of the calibrator:
//! - ground-plane recovery from marker observations,
//! - the camera-projection frame and the planar (yaw + XY) extrinsic
//!   extraction over odometry/marker hyper-edges,
//! - fundamental-matrix estimation and the two-stage feature-match filter,
//! - two-view triangulation with a parallax gate.
//!
//! All solves run in `f64`; inputs arrive through `camodo-core` entities.

pub mod fundamental;
pub mod ground_plane;
pub mod hyper_edges;
pub mod matches;
pub mod planar_extrinsic;
pub mod proj_frame;
pub mod triangulation;

pub use fundamental::{fundamental_8point, fundamental_ransac};
pub use ground_plane::estimate_ground_plane;
pub use hyper_edges::{collect_hyper_edges, covisible_landmarks, partition_by_rotation, HyperEdge};
pub use matches::{filter_matches, reject_outlier_dist, reject_outlier_ransac};
pub use planar_extrinsic::initialize_extrinsic;
pub use proj_frame::camera_projection_frame;
pub use triangulation::{parallax_ok, triangulate_two_view};
