//! Measurement edges binding dataset entities with information matrices.
//!
//! Information matrices are symmetric positive-definite; the builders in
//! this workspace construct them diagonal, but consumers must not rely on
//! that.

use crate::entities::{KfId, LmId};
use crate::math::{Mat2, Mat3, Pt2, Real, Se2, Vec3};

/// SE(2) odometry increment between two consecutive keyframes.
///
/// `meas` is the group right-difference `tail ⊟ head` expressed in the head
/// frame; `info` weights `(x, y, theta)` residuals.
#[derive(Debug, Clone)]
pub struct OdoEdge {
    pub head: KfId,
    pub tail: KfId,
    pub meas: Se2,
    pub info: Mat3,
}

/// A marker observation: the landmark's 3D position measured in the camera
/// frame of one keyframe.
#[derive(Debug, Clone)]
pub struct MarkEdge {
    pub kf: KfId,
    pub lm: LmId,
    pub meas: Vec3,
    pub info: Mat3,
}

/// A visual observation: one undistorted pixel of a triangulated map point.
///
/// The camera intrinsics the pixel refers to live on the owning dataset;
/// `kp_index` identifies the source keypoint inside the keyframe so that
/// re-observations of the same map point can be associated.
#[derive(Debug, Clone)]
pub struct UvEdge {
    pub kf: KfId,
    pub lm: LmId,
    pub kp_index: usize,
    pub uv: Pt2,
    pub info: Mat2,
}

/// Depth-scaled diagonal information for a marker observation.
///
/// Lateral and depth standard deviations grow linearly with the measured
/// camera-frame depth `z`, floored by the configured minima.
pub fn marker_information(
    z: Real,
    xy_err_ratio_z: Real,
    xy_err_min: Real,
    z_err_ratio_z: Real,
    z_err_min: Real,
) -> Mat3 {
    let z = z.abs();
    let std_xy = (z * xy_err_ratio_z).max(xy_err_min);
    let std_z = (z * z_err_ratio_z).max(z_err_min);
    Mat3::from_diagonal(&Vec3::new(
        1.0 / (std_xy * std_xy),
        1.0 / (std_xy * std_xy),
        1.0 / (std_z * std_z),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_information_is_diagonal_positive_and_depth_scaled() {
        let near = marker_information(0.5, 0.01, 0.002, 0.02, 0.004);
        let far = marker_information(5.0, 0.01, 0.002, 0.02, 0.004);

        for info in [&near, &far] {
            for i in 0..3 {
                assert!(info[(i, i)] > 0.0);
                for j in 0..3 {
                    if i != j {
                        assert_eq!(info[(i, j)], 0.0);
                    }
                }
            }
        }
        // Farther observations carry less information.
        assert!(far[(0, 0)] < near[(0, 0)]);
        assert!(far[(2, 2)] < near[(2, 2)]);
    }

    #[test]
    fn marker_information_respects_floors() {
        let info = marker_information(0.01, 0.01, 0.002, 0.02, 0.004);
        assert!((info[(0, 0)] - 1.0 / (0.002 * 0.002)).abs() < 1e-9);
        assert!((info[(2, 2)] - 1.0 / (0.004 * 0.004)).abs() < 1e-9);
    }
}
