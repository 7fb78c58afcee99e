//! Two-view triangulation with a parallax gate.
//!
//! Used by the visual bootstrap to seed map points from filtered matches.

use nalgebra::SMatrix;

use camodo_core::{CalibError, CalibResult, Mat34, Pt2, Pt3, Real};

/// DLT triangulation from two projection matrices and pixel observations.
pub fn triangulate_two_view(p1: &Mat34, p2: &Mat34, uv1: &Pt2, uv2: &Pt2) -> CalibResult<Pt3> {
    let mut a = SMatrix::<Real, 4, 4>::zeros();
    a.row_mut(0).copy_from(&(uv1.x * p1.row(2) - p1.row(0)));
    a.row_mut(1).copy_from(&(uv1.y * p1.row(2) - p1.row(1)));
    a.row_mut(2).copy_from(&(uv2.x * p2.row(2) - p2.row(0)));
    a.row_mut(3).copy_from(&(uv2.y * p2.row(2) - p2.row(1)));

    let svd = a.svd(true, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::NumericFailure("triangulation svd did not converge".into()))?;
    let x = v_t.row(3);

    let w = x[3];
    if w.abs() <= Real::EPSILON {
        return Err(CalibError::NumericFailure(
            "triangulation produced a point at infinity".into(),
        ));
    }
    Ok(Pt3::new(x[0] / w, x[1] / w, x[2] / w))
}

/// Whether the ray angle at the two optical centres exceeds
/// `min_parallax_rad`. Points triangulated under low parallax are depth
/// noise and must be rejected.
pub fn parallax_ok(c1: &Pt3, c2: &Pt3, p: &Pt3, min_parallax_rad: Real) -> bool {
    let v1 = c1 - p;
    let v2 = c2 - p;
    let n1 = v1.norm();
    let n2 = v2.norm();
    if n1 < 1e-12 || n2 < 1e-12 {
        return false;
    }
    let cos = (v1.dot(&v2) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos() > min_parallax_rad
}

#[cfg(test)]
mod tests {
    use super::*;
    use camodo_core::{test_camera, Iso3};
    use nalgebra::{Translation3, UnitQuaternion};

    #[test]
    fn recovers_a_point_from_two_views() {
        let cam = test_camera();
        let left = Iso3::identity();
        let right = Iso3::from_parts(
            Translation3::new(0.2, 0.0, 0.0),
            UnitQuaternion::identity(),
        );

        let pw = Pt3::new(0.1, -0.05, 2.0);
        let uv1 = cam.project_point(&left.inverse_transform_point(&pw)).unwrap();
        let uv2 = cam
            .project_point(&right.inverse_transform_point(&pw))
            .unwrap();

        let p1 = cam.projection_matrix(&left);
        let p2 = cam.projection_matrix(&right);
        let est = triangulate_two_view(&p1, &p2, &uv1, &uv2).unwrap();

        assert!((est - pw).norm() < 1e-6, "error {}", (est - pw).norm());
    }

    #[test]
    fn parallax_gate_accepts_wide_and_rejects_narrow() {
        let p = Pt3::new(0.0, 0.0, 5.0);
        let c1 = Pt3::new(0.0, 0.0, 0.0);
        let near = Pt3::new(0.01, 0.0, 0.0);
        let far = Pt3::new(1.0, 0.0, 0.0);

        let one_deg = 1.0_f64.to_radians();
        assert!(!parallax_ok(&c1, &near, &p, one_deg));
        assert!(parallax_ok(&c1, &far, &p, one_deg));
        // Coincident centre and point is never accepted.
        assert!(!parallax_ok(&c1, &far, &c1, one_deg));
    }
}
