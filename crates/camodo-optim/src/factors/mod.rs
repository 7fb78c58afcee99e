//! Residual models for the calibration graphs.
//!
//! Every residual is generic over the scalar so the backend can evaluate it
//! on dual numbers for automatic differentiation; measurements enter as
//! `f64` constants lifted with `T::from_f64`. Residuals are pre-whitened by
//! the upper-triangular square root of the edge information.

use nalgebra::{DVectorView, Quaternion, RealField, SVector, UnitQuaternion, Vector2, Vector3};

/// Epsilon added to depth before the perspective division.
pub const PROJECTION_EPS: f64 = 1.0e-9;

fn wrap_generic<T: RealField>(x: T) -> T {
    // Branch-free angle wrap, differentiable away from +-pi.
    x.clone().sin().atan2(x.cos())
}

fn whiten3<T: RealField>(w: &[f64; 9], e: Vector3<T>) -> SVector<T, 3> {
    let c = |i: usize| T::from_f64(w[i]).unwrap();
    SVector::<T, 3>::new(
        c(0) * e.x.clone() + c(1) * e.y.clone() + c(2) * e.z.clone(),
        c(3) * e.x.clone() + c(4) * e.y.clone() + c(5) * e.z.clone(),
        c(6) * e.x.clone() + c(7) * e.y.clone() + c(8) * e.z.clone(),
    )
}

fn whiten2<T: RealField>(w: &[f64; 4], e: Vector2<T>) -> SVector<T, 2> {
    let c = |i: usize| T::from_f64(w[i]).unwrap();
    SVector::<T, 2>::new(
        c(0) * e.x.clone() + c(1) * e.y.clone(),
        c(2) * e.x.clone() + c(3) * e.y.clone(),
    )
}

/// SE(2) odometry residual: the increment between the two pose estimates
/// minus the measured increment, in the head frame, angle wrapped.
pub fn odo_se2_residual_generic<T: RealField>(
    head: DVectorView<'_, T>,
    tail: DVectorView<'_, T>,
    meas: [f64; 3],
    sqrt_info: [f64; 9],
) -> SVector<T, 3> {
    debug_assert!(head.len() == 3 && tail.len() == 3, "poses must be 3D blocks");

    let theta = head[2].clone();
    let (s, c) = (theta.clone().sin(), theta.cos());
    let dx = tail[0].clone() - head[0].clone();
    let dy = tail[1].clone() - head[1].clone();

    let inc_x = c.clone() * dx.clone() + s.clone() * dy.clone();
    let inc_y = -s * dx + c * dy;
    let inc_theta = tail[2].clone() - head[2].clone();

    let e = Vector3::new(
        inc_x - T::from_f64(meas[0]).unwrap(),
        inc_y - T::from_f64(meas[1]).unwrap(),
        wrap_generic(inc_theta - T::from_f64(meas[2]).unwrap()),
    );
    whiten3(&sqrt_info, e)
}

/// Landmark position in the camera frame of a keyframe, through the
/// extrinsic: `(lift(kf) * x_bc)^-1 * lm`.
fn camera_frame_point<T: RealField>(
    extr: DVectorView<'_, T>,
    kf: DVectorView<'_, T>,
    lm: DVectorView<'_, T>,
) -> Vector3<T> {
    debug_assert!(extr.len() == 7, "extrinsic must be a 7D SE3 block");
    debug_assert!(kf.len() == 3 && lm.len() == 3, "kf/lm must be 3D blocks");

    let q_x = UnitQuaternion::from_quaternion(Quaternion::new(
        extr[3].clone(),
        extr[0].clone(),
        extr[1].clone(),
        extr[2].clone(),
    ));
    let t_x = Vector3::new(extr[4].clone(), extr[5].clone(), extr[6].clone());

    let half = kf[2].clone() * T::from_f64(0.5).unwrap();
    let q_kf = UnitQuaternion::from_quaternion(Quaternion::new(
        half.clone().cos(),
        T::zero(),
        T::zero(),
        half.sin(),
    ));

    // World offset from the keyframe origin; the base sits on the plane.
    let p = Vector3::new(
        lm[0].clone() - kf[0].clone(),
        lm[1].clone() - kf[1].clone(),
        lm[2].clone(),
    );
    let p_base = q_kf.inverse_transform_vector(&p);
    q_x.inverse_transform_vector(&(p_base - t_x))
}

/// Marker observation residual: predicted camera-frame position minus the
/// measured 3-vector.
pub fn mark_point3_residual_generic<T: RealField>(
    extr: DVectorView<'_, T>,
    kf: DVectorView<'_, T>,
    lm: DVectorView<'_, T>,
    meas: [f64; 3],
    sqrt_info: [f64; 9],
) -> SVector<T, 3> {
    let pc = camera_frame_point(extr, kf, lm);
    let e = Vector3::new(
        pc.x.clone() - T::from_f64(meas[0]).unwrap(),
        pc.y.clone() - T::from_f64(meas[1]).unwrap(),
        pc.z.clone() - T::from_f64(meas[2]).unwrap(),
    );
    whiten3(&sqrt_info, e)
}

/// Visual observation residual: measured undistorted pixel minus the map
/// point reprojected through fixed intrinsics `[fx, fy, cx, cy]`.
pub fn reproj_uv_residual_generic<T: RealField>(
    extr: DVectorView<'_, T>,
    kf: DVectorView<'_, T>,
    lm: DVectorView<'_, T>,
    uv: [f64; 2],
    cam: [f64; 4],
    sqrt_info: [f64; 4],
) -> SVector<T, 2> {
    let pc = camera_frame_point(extr, kf, lm);

    let z = pc.z.clone() + T::from_f64(PROJECTION_EPS).unwrap();
    let x = pc.x.clone() / z.clone();
    let y = pc.y.clone() / z;

    let fx = T::from_f64(cam[0]).unwrap();
    let fy = T::from_f64(cam[1]).unwrap();
    let cx = T::from_f64(cam[2]).unwrap();
    let cy = T::from_f64(cam[3]).unwrap();

    let e = Vector2::new(
        T::from_f64(uv[0]).unwrap() - (fx * x + cx),
        T::from_f64(uv[1]).unwrap() - (fy * y + cy),
    );
    whiten2(&sqrt_info, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::pose::{iso3_to_se3_dvec, se2_to_dvec};
    use camodo_core::synthetic::example_extrinsic;
    use camodo_core::{Pt3, Se2};
    use nalgebra::dvector;

    const EYE3: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    #[test]
    fn odo_residual_vanishes_on_a_consistent_triple() {
        let head = Se2::new(0.5, -0.2, 0.3);
        let inc = Se2::new(0.7, 0.1, -0.4);
        let tail = head.plus(&inc);

        let r = odo_se2_residual_generic::<f64>(
            se2_to_dvec(&head).as_view(),
            se2_to_dvec(&tail).as_view(),
            [inc.x, inc.y, inc.theta],
            EYE3,
        );
        assert!(r.norm() < 1e-12, "residual {}", r.norm());
    }

    #[test]
    fn odo_residual_matches_the_group_difference() {
        let head = Se2::new(1.0, 2.0, 1.2);
        let tail = Se2::new(0.0, 2.5, -2.8);
        let meas = Se2::new(0.1, 0.0, 0.05);

        let r = odo_se2_residual_generic::<f64>(
            se2_to_dvec(&head).as_view(),
            se2_to_dvec(&tail).as_view(),
            [meas.x, meas.y, meas.theta],
            EYE3,
        );

        let inc = Se2::inc(&head, &tail);
        assert!((r[0] - (inc.x - meas.x)).abs() < 1e-12);
        assert!((r[1] - (inc.y - meas.y)).abs() < 1e-12);
        assert!((r[2] - camodo_core::wrap_pi(inc.theta - meas.theta)).abs() < 1e-12);
    }

    #[test]
    fn odo_residual_scales_with_sqrt_information() {
        let head = Se2::default();
        let tail = Se2::new(1.0, 0.0, 0.0);
        let w = [2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 5.0];
        let r = odo_se2_residual_generic::<f64>(
            se2_to_dvec(&head).as_view(),
            se2_to_dvec(&tail).as_view(),
            [0.0, 0.0, 0.0],
            w,
        );
        assert!((r[0] - 2.0).abs() < 1e-12);
        assert!(r[1].abs() < 1e-12 && r[2].abs() < 1e-12);
    }

    #[test]
    fn mark_residual_vanishes_on_ground_truth() {
        let x_bc = example_extrinsic();
        let kf = Se2::new(1.0, -0.5, 0.8);
        let lm = Pt3::new(2.0, 1.0, 0.0);

        let cam_world = kf.lift() * x_bc;
        let meas = cam_world.inverse_transform_point(&lm);

        let r = mark_point3_residual_generic::<f64>(
            iso3_to_se3_dvec(&x_bc).as_view(),
            se2_to_dvec(&kf).as_view(),
            dvector![lm.x, lm.y, lm.z].as_view(),
            [meas.x, meas.y, meas.z],
            EYE3,
        );
        assert!(r.norm() < 1e-9, "residual {}", r.norm());
    }

    #[test]
    fn reproj_residual_vanishes_on_ground_truth() {
        let cam = camodo_core::test_camera();
        let x_bc = example_extrinsic();
        let kf = Se2::new(0.2, 0.1, -0.3);
        let lm = Pt3::new(1.0, 3.0, 0.2);

        let cam_world = kf.lift() * x_bc;
        let pc = cam_world.inverse_transform_point(&lm);
        // The sampled landmark must be in front of this camera.
        assert!(pc.z > 0.1);
        let uv = cam.project_point(&pc).unwrap();

        let r = reproj_uv_residual_generic::<f64>(
            iso3_to_se3_dvec(&x_bc).as_view(),
            se2_to_dvec(&kf).as_view(),
            dvector![lm.x, lm.y, lm.z].as_view(),
            [uv.x, uv.y],
            [cam.fx, cam.fy, cam.cx, cam.cy],
            [1.0, 0.0, 0.0, 1.0],
        );
        assert!(r.norm() < 1e-6, "residual {}", r.norm());
    }
}
