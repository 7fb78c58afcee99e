//! Mathematical type aliases and small geometry helpers.
//!
//! Storage at the entity boundary is `f64` throughout; every matrix solve in
//! the workspace (SVD, least squares, Cholesky) also runs in `f64` so that
//! near-planar configurations do not lose rank to rounding.

use nalgebra::{
    Isometry3, Matrix2, Matrix3, Matrix4, Point2, Point3, Rotation3, SMatrix, Vector2, Vector3,
};

mod se2;

pub use se2::Se2;

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 2×2 matrix with [`Real`] entries.
pub type Mat2 = Matrix2<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;
/// 3×4 projection matrix with [`Real`] entries.
pub type Mat34 = SMatrix<Real, 3, 4>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Wrap `x` into the half-open interval `(lo, hi]`.
///
/// The interval is assumed to span one period (`hi - lo`), e.g.
/// `wrap_angle(x, PI, -PI)` for angles in `(-pi, pi]`.
pub fn wrap_angle(x: Real, hi: Real, lo: Real) -> Real {
    let span = hi - lo;
    hi - (hi - x).rem_euclid(span)
}

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_pi(x: Real) -> Real {
    wrap_angle(x, std::f64::consts::PI, -std::f64::consts::PI)
}

/// Rotation matrix from an axis-angle (Rodrigues) vector.
pub fn rvec_to_rotation(rvec: &Vec3) -> Mat3 {
    Rotation3::from_scaled_axis(*rvec).into_inner()
}

/// Axis-angle (Rodrigues) vector from a rotation matrix.
///
/// The input is re-orthonormalized before the log map, so mildly drifted
/// matrices are accepted.
pub fn rotation_to_rvec(r: &Mat3) -> Vec3 {
    Rotation3::from_matrix(r).scaled_axis()
}

/// Build an SE(3) transform from axis-angle rotation and translation vectors.
pub fn iso3_from_rvec_tvec(rvec: &Vec3, tvec: &Vec3) -> Iso3 {
    Iso3::from_parts(
        (*tvec).into(),
        nalgebra::UnitQuaternion::from_scaled_axis(*rvec),
    )
}

/// Decompose an SE(3) transform into axis-angle rotation and translation.
pub fn rvec_tvec_from_iso3(iso: &Iso3) -> (Vec3, Vec3) {
    (iso.rotation.scaled_axis(), iso.translation.vector)
}

/// Translation-norm plus rotation-angle distance between two SE(3) poses.
///
/// Returns `(translation_error, rotation_error_rad)`; used by tests and for
/// reporting how far an estimate is from a reference.
pub fn pose_error(a: &Iso3, b: &Iso3) -> (Real, Real) {
    let dt = (a.translation.vector - b.translation.vector).norm();
    let dr = a.rotation.angle_to(&b.rotation);
    (dt, dr)
}

/// Like [`pose_error`], but the translation error ignores the z component.
///
/// The height of the camera above the ground plane is a gauge direction of
/// this calibration problem (marker heights are free parameters), so
/// accuracy statements about the extrinsic are made modulo z.
pub fn planar_pose_error(a: &Iso3, b: &Iso3) -> (Real, Real) {
    let d = a.translation.vector - b.translation.vector;
    let dt = d.x.hypot(d.y);
    let dr = a.rotation.angle_to(&b.rotation);
    (dt, dr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn wrap_angle_maps_into_half_open_interval() {
        assert!((wrap_pi(PI) - PI).abs() < 1e-12);
        assert!((wrap_pi(-PI) - PI).abs() < 1e-12);
        assert!((wrap_pi(3.0 * PI) - PI).abs() < 1e-12);
        assert!((wrap_pi(0.25) - 0.25).abs() < 1e-12);
        assert!((wrap_pi(2.0 * PI + 0.25) - 0.25).abs() < 1e-12);
        assert!((wrap_pi(-2.0 * PI - 0.25) + 0.25).abs() < 1e-12);
    }

    #[test]
    fn rvec_rotation_roundtrip() {
        let rvec = Vec3::new(0.3, -0.2, 0.9);
        let r = rvec_to_rotation(&rvec);
        let back = rotation_to_rvec(&r);
        assert!((back - rvec).norm() < 1e-9);
    }

    #[test]
    fn iso3_from_rvec_tvec_roundtrip() {
        let rvec = Vec3::new(0.0, 0.0, PI / 2.0);
        let tvec = Vec3::new(1.0, 2.0, 3.0);
        let iso = iso3_from_rvec_tvec(&rvec, &tvec);
        let (r_back, t_back) = rvec_tvec_from_iso3(&iso);
        assert!((r_back - rvec).norm() < 1e-9);
        assert!((t_back - tvec).norm() < 1e-12);

        let p = iso.transform_point(&Pt3::new(1.0, 0.0, 0.0));
        assert!((p - Pt3::new(1.0, 3.0, 3.0)).norm() < 1e-9);
    }
}
