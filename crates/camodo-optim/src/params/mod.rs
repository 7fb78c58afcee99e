//! Parameter-vector conversions between entity types and solver storage.

pub mod pose;

pub use pose::{iso3_to_se3_dvec, se2_from_dvec, se2_to_dvec, se3_dvec_to_iso3};
