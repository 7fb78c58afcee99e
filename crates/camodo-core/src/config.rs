//! Serializable solver configuration.
//!
//! Every knob the pipeline consumes is enumerated here with a sensible
//! default, so a config file only needs to override what it cares about.

use serde::{Deserialize, Serialize};

use crate::math::{iso3_from_rvec_tvec, Iso3, Real, Vec3};

/// Odometry noise model parameters consumed by the edge builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OdoNoiseConfig {
    /// Linear standard deviation per metre travelled.
    pub lin_err_ratio: Real,
    /// Floor on the linear standard deviation, metres.
    pub lin_err_min: Real,
    /// Rotational standard deviation per radian turned.
    pub rot_err_ratio: Real,
    /// Rotational standard deviation per metre travelled; long translations
    /// accumulate heading drift even when the commanded rotation is small.
    pub rot_err_ratio_lin: Real,
    /// Floor on the rotational standard deviation, radians.
    pub rot_err_min: Real,
}

impl Default for OdoNoiseConfig {
    fn default() -> Self {
        Self {
            lin_err_ratio: 0.01,
            lin_err_min: 1e-3,
            rot_err_ratio: 0.01,
            rot_err_ratio_lin: 2e-3,
            rot_err_min: 1e-3,
        }
    }
}

/// Marker observation noise scales (depth-linear).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkNoiseConfig {
    pub xy_err_ratio_z: Real,
    pub xy_err_min: Real,
    pub z_err_ratio_z: Real,
    pub z_err_min: Real,
}

impl Default for MarkNoiseConfig {
    fn default() -> Self {
        Self {
            xy_err_ratio_z: 0.01,
            xy_err_min: 2e-3,
            z_err_ratio_z: 0.02,
            z_err_min: 4e-3,
        }
    }
}

/// Closed-form initializer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Fallback extrinsic rotation (axis-angle, base<-camera) for callers
    /// that skip or survive a failed initializer.
    pub initial_rvec_bc: [Real; 3],
    /// Fallback extrinsic translation, metres.
    pub initial_tvec_bc: [Real; 3],
    /// Edges with `|d_theta| / |d_t|` below this are small-rotation and feed
    /// the yaw stage; the rest feed the XY stage. Radians per metre of
    /// translation.
    pub small_rotation_ratio_threshold: Real,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            initial_rvec_bc: [0.0; 3],
            initial_tvec_bc: [0.0; 3],
            small_rotation_ratio_threshold: 1.0 / 5000.0,
        }
    }
}

/// Visual match-filter and bootstrap parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Maximum pixel displacement between undistorted keypoints.
    pub distance_gate_px: Real,
    /// Inlier reprojection gate for the fundamental-matrix RANSAC, pixels.
    pub ransac_pixel_gate: Real,
    /// RANSAC confidence level.
    pub ransac_confidence: Real,
    /// Seed for the RANSAC sampler; fixed for reproducibility.
    pub ransac_seed: u64,
    /// Both filter stages need at least this many input matches.
    pub min_matches: usize,
    /// Minimum ray angle at the two optical centres for a triangulated map
    /// point to be accepted, degrees.
    pub min_parallax_deg: Real,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            distance_gate_px: 100.0,
            ransac_pixel_gate: 3.0,
            ransac_confidence: 0.99,
            ransac_seed: 1_234_567,
            min_matches: 10,
            min_parallax_deg: 1.0,
        }
    }
}

/// Graph optimizer caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimConfig {
    pub max_iter_marker: usize,
    pub max_iter_visual: usize,
    /// Backend verbosity (0 = quiet).
    pub verbosity: usize,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            max_iter_marker: 100,
            max_iter_visual: 15,
            verbosity: 0,
        }
    }
}

/// Top-level solver configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub odo: OdoNoiseConfig,
    pub marker: MarkNoiseConfig,
    pub init: InitConfig,
    pub visual: VisualConfig,
    pub optim: OptimConfig,
}

impl SolverConfig {
    /// The configured fallback extrinsic as an SE(3) transform.
    pub fn initial_extrinsic(&self) -> Iso3 {
        iso3_from_rvec_tvec(
            &Vec3::from_row_slice(&self.init.initial_rvec_bc),
            &Vec3::from_row_slice(&self.init.initial_tvec_bc),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_json_roundtrip() {
        let mut cfg = SolverConfig::default();
        cfg.odo.lin_err_ratio = 0.02;
        cfg.init.initial_tvec_bc = [0.1, 0.0, 0.3];
        cfg.optim.max_iter_marker = 42;

        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let de: SolverConfig = serde_json::from_str(&json).unwrap();

        assert!((de.odo.lin_err_ratio - 0.02).abs() < 1e-12);
        assert_eq!(de.optim.max_iter_marker, 42);
        assert!((de.initial_extrinsic().translation.vector.x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let de: SolverConfig =
            serde_json::from_str(r#"{"optim": {"max_iter_visual": 30}}"#).unwrap();
        assert_eq!(de.optim.max_iter_visual, 30);
        assert_eq!(de.optim.max_iter_marker, 100);
        assert!(
            (de.init.small_rotation_ratio_threshold - 1.0 / 5000.0).abs() < 1e-15
        );
        assert_eq!(de.visual.min_matches, 10);
    }
}
