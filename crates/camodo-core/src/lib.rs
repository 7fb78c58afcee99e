//! Core types for `camodo-rs`, an extrinsic calibrator between planar wheel
//! odometry and an onboard camera.
//!
//! This crate contains:
//! - linear algebra type aliases and the planar pose type ([`Se2`]),
//! - dataset entities ([`Keyframe`], [`Landmark`]) and measurement edges,
//! - the [`Dataset`] arena that owns entities and maintains lookup indices,
//! - a compact pinhole camera model with Brown-Conrady distortion,
//! - serializable solver configuration,
//! - deterministic synthetic scenes for tests.
//!
//! The closed-form initializer lives in `camodo-linear`, the factor-graph
//! optimizer in `camodo-optim`, and the solver drivers in `camodo-pipeline`;
//! everything is re-exported through the top-level `camodo` crate.

/// Pinhole camera model and distortion utilities.
pub mod camera;
/// Solver configuration structures.
pub mod config;
/// Dataset arena and indexing.
pub mod dataset;
/// Keyframe and landmark entities.
pub mod entities;
/// Error kinds surfaced by the calibration pipeline.
pub mod error;
/// Linear algebra type aliases and planar pose helpers.
pub mod math;
/// Measurement edge types.
pub mod measure;
/// Generic RANSAC engine and traits.
pub mod ransac;
/// Deterministic synthetic scene generation for tests and examples.
pub mod synthetic;

pub use camera::*;
pub use config::*;
pub use dataset::*;
pub use entities::*;
pub use error::*;
pub use math::*;
pub use measure::*;
pub use ransac::*;
