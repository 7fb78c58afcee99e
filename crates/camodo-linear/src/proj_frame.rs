//! Camera-projection frame construction.
//!
//! Given the ground normal in the camera frame, build an intermediate frame
//! `d` whose z-axis is the normal and whose x/y axes span the ground plane.
//! The extrinsic then decomposes into the out-of-plane rotation `c -> d`
//! and a planar transform `d -> b`.

use camodo_core::{Mat3, Vec3};

/// Rotation `R_dc` (camera -> projection frame) for a unit ground normal.
///
/// The auxiliary vector is the world basis axis least aligned with the
/// normal; `r_x = normalize(n × a)`, `r_y = n × r_x`, `r_z = n` form the
/// columns of `R_cd`, and the transpose is returned. The normal's sign is
/// ambiguous: call once per sign and disambiguate downstream by residual.
pub fn camera_projection_frame(n_cg: &Vec3) -> Mat3 {
    let ax = n_cg.x.abs();
    let ay = n_cg.y.abs();
    let az = n_cg.z.abs();
    let aux = if ax < ay && ax < az {
        Vec3::x()
    } else if ay < az {
        Vec3::y()
    } else {
        Vec3::z()
    };

    let r_x = n_cg.cross(&aux).normalize();
    let r_y = n_cg.cross(&r_x);
    let r_cd = Mat3::from_columns(&[r_x, r_y, *n_cg]);
    r_cd.transpose()
}
