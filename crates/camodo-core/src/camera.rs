//! Compact pinhole camera model with Brown-Conrady distortion.
//!
//! The visual variant of the calibrator only needs pixel/normalized
//! conversions, iterative undistortion and the 3×4 projection matrix of a
//! posed camera; detection and feature extraction stay with collaborators.

use serde::{Deserialize, Serialize};

use crate::math::{Iso3, Mat3, Mat34, Pt2, Pt3, Real, Vec2};

/// Brown-Conrady radial-tangential distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady {
    pub k1: Real,
    pub k2: Real,
    pub k3: Real,
    pub p1: Real,
    pub p2: Real,
    /// Fixed-point iterations used by [`BrownConrady::undistort`].
    pub iters: u32,
}

impl Default for BrownConrady {
    fn default() -> Self {
        Self {
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            p1: 0.0,
            p2: 0.0,
            iters: 8,
        }
    }
}

impl BrownConrady {
    /// Apply forward distortion to normalized coordinates.
    pub fn distort(&self, n: &Vec2) -> Vec2 {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Vec2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert the distortion by fixed-point iteration.
    pub fn undistort(&self, n: &Vec2) -> Vec2 {
        let mut u = *n;
        for _ in 0..self.iters {
            let d = self.distort(&u);
            u += *n - d;
        }
        u
    }
}

/// Pinhole intrinsics plus distortion; read-only collaborator data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
    pub dist: BrownConrady,
}

impl CameraModel {
    pub fn new(fx: Real, fy: Real, cx: Real, cy: Real, dist: BrownConrady) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            dist,
        }
    }

    /// The 3×3 intrinsics matrix K.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    pub fn pixel_to_normalized(&self, pixel: &Pt2) -> Vec2 {
        Vec2::new(
            (pixel.x - self.cx) / self.fx,
            (pixel.y - self.cy) / self.fy,
        )
    }

    pub fn normalized_to_pixel(&self, n: &Vec2) -> Pt2 {
        Pt2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    /// Undistort a raw pixel into its ideal pinhole pixel.
    pub fn undistort_pixel(&self, pixel: &Pt2) -> Pt2 {
        let n = self.pixel_to_normalized(pixel);
        let u = self.dist.undistort(&n);
        self.normalized_to_pixel(&u)
    }

    /// Project a camera-frame point onto the (undistorted) image plane.
    ///
    /// Returns `None` for points at or behind the optical centre.
    pub fn project_point(&self, pc: &Pt3) -> Option<Pt2> {
        if pc.z <= 1e-9 {
            return None;
        }
        let n = Vec2::new(pc.x / pc.z, pc.y / pc.z);
        Some(self.normalized_to_pixel(&n))
    }

    /// The 3×4 projection matrix `K [R | t]` of a camera posed at
    /// `cam_world` (camera pose in the world frame).
    pub fn projection_matrix(&self, cam_world: &Iso3) -> Mat34 {
        let world_cam = cam_world.inverse();
        let r = world_cam.rotation.to_rotation_matrix();
        let t = world_cam.translation.vector;
        let mut rt = Mat34::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(r.matrix());
        rt.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
        self.k_matrix() * rt
    }
}

/// Project a world point through a 3×4 projection matrix.
pub fn project_through(p_mat: &Mat34, pw: &Pt3) -> Option<Pt2> {
    let x = p_mat * nalgebra::Vector4::new(pw.x, pw.y, pw.z, 1.0);
    if x.z.abs() <= 1e-12 {
        return None;
    }
    Some(Pt2::new(x.x / x.z, x.y / x.z))
}

/// Convenience constructor used by tests across the workspace.
pub fn test_camera() -> CameraModel {
    CameraModel::new(800.0, 780.0, 640.0, 360.0, BrownConrady::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn pixel_normalized_roundtrip() {
        let cam = test_camera();
        let pixel = Pt2::new(700.0, 400.0);
        let n = cam.pixel_to_normalized(&pixel);
        let back = cam.normalized_to_pixel(&n);
        assert!((back - pixel).norm() < 1e-10);
    }

    #[test]
    fn undistort_is_identity_without_distortion() {
        let cam = test_camera();
        let pixel = Pt2::new(500.0, 420.0);
        assert!((cam.undistort_pixel(&pixel) - pixel).norm() < 1e-10);
    }

    #[test]
    fn distort_undistort_approximate_roundtrip() {
        let dist = BrownConrady {
            k1: -0.3,
            k2: 0.1,
            p1: 0.001,
            p2: -0.001,
            ..Default::default()
        };
        let n = Vec2::new(-0.1, 0.05);
        let d = dist.distort(&n);
        let back = dist.undistort(&d);
        assert!((back - n).norm() < 1e-6, "roundtrip error {}", (back - n).norm());
    }

    #[test]
    fn projection_matrix_matches_direct_projection() {
        let cam = test_camera();
        let cam_world = crate::math::iso3_from_rvec_tvec(
            &Vec3::new(0.0, 0.1, 0.0),
            &Vec3::new(0.2, -0.1, 0.0),
        );
        let pw = Pt3::new(0.3, 0.1, 2.0);

        let pc = cam_world.inverse_transform_point(&pw);
        let direct = cam.project_point(&pc).unwrap();

        let p_mat = cam.projection_matrix(&cam_world);
        let via_matrix = project_through(&p_mat, &pw).unwrap();

        assert!((direct - via_matrix).norm() < 1e-9);
    }

    #[test]
    fn behind_camera_points_do_not_project() {
        let cam = test_camera();
        assert!(cam.project_point(&Pt3::new(0.0, 0.0, -1.0)).is_none());
    }
}
