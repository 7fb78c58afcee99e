//! SE(3) and SE(2) parameter conversions for the solver backend.

use anyhow::{ensure, Result};
use nalgebra::{DVector, DVectorView, Quaternion, UnitQuaternion, Vector3};

use camodo_core::{wrap_pi, Iso3, Se2};

/// Convert an `Iso3` into a 7D SE(3) vector `[qx, qy, qz, qw, tx, ty, tz]`.
pub fn iso3_to_se3_dvec(pose: &Iso3) -> DVector<f64> {
    let q = pose.rotation.into_inner();
    let t = pose.translation.vector;
    nalgebra::dvector![q.coords[0], q.coords[1], q.coords[2], q.coords[3], t.x, t.y, t.z]
}

/// Convert a 7D SE(3) vector `[qx, qy, qz, qw, tx, ty, tz]` into an `Iso3`.
pub fn se3_dvec_to_iso3(v: DVectorView<'_, f64>) -> Result<Iso3> {
    ensure!(
        v.len() == 7,
        "an SE(3) block packs 7 values, this one has {}",
        v.len()
    );
    let quat = Quaternion::new(v[3], v[0], v[1], v[2]);
    let rot = UnitQuaternion::from_quaternion(quat);
    let trans = Vector3::new(v[4], v[5], v[6]);
    Ok(Iso3::from_parts(trans.into(), rot))
}

/// Convert a planar pose into its 3D Euclidean block `[x, y, theta]`.
pub fn se2_to_dvec(pose: &Se2) -> DVector<f64> {
    nalgebra::dvector![pose.x, pose.y, pose.theta]
}

/// Convert a 3D Euclidean block back into a planar pose, re-wrapping the
/// angle the solver may have pushed outside `(-pi, pi]`.
pub fn se2_from_dvec(v: DVectorView<'_, f64>) -> Result<Se2> {
    ensure!(
        v.len() == 3,
        "a planar pose block packs 3 values, this one has {}",
        v.len()
    );
    Ok(Se2::new(v[0], v[1], wrap_pi(v[2])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camodo_core::iso3_from_rvec_tvec;

    #[test]
    fn iso3_dvec_roundtrip() {
        let pose = iso3_from_rvec_tvec(
            &Vector3::new(0.2, -0.4, 1.1),
            &Vector3::new(0.1, 0.0, 0.3),
        );
        let v = iso3_to_se3_dvec(&pose);
        let back = se3_dvec_to_iso3(v.as_view()).unwrap();
        let (dt, dr) = camodo_core::pose_error(&pose, &back);
        assert!(dt < 1e-12 && dr < 1e-12);
    }

    #[test]
    fn se2_dvec_roundtrip_wraps_angle() {
        let v = nalgebra::dvector![1.0, -2.0, 4.0];
        let pose = se2_from_dvec(v.as_view()).unwrap();
        assert!((pose.theta - (4.0 - 2.0 * std::f64::consts::PI)).abs() < 1e-12);
        let back = se2_to_dvec(&pose);
        assert!((back[0] - 1.0).abs() < 1e-12);
    }
}
