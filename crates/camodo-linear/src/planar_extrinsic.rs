//! Closed-form extrinsic initialization from odometry/marker hyper-edges.
//!
//! The extrinsic decomposes as `T_bc = T_bd * T_dc`: `T_dc` is the
//! out-of-plane rotation fixed by the ground normal, `T_bd` a planar
//! transform (yaw + XY) recovered from hyper-edges. Small-rotation edges
//! constrain the yaw; large-rotation edges constrain the XY offset.

use log::debug;
use nalgebra::DMatrix;

use camodo_core::{
    CalibError, CalibResult, Dataset, InitConfig, Iso3, Mat3, Real, Vec3, wrap_pi,
};

use crate::ground_plane::estimate_ground_plane;
use crate::hyper_edges::{collect_hyper_edges, partition_by_rotation, HyperEdge};
use crate::proj_frame::camera_projection_frame;

struct PlanarCandidate {
    r_dc: Mat3,
    yaw: Real,
    t_bd: Vec3,
    residual_norm: Real,
}

/// Recover the full SE(3) extrinsic `X_bc` (camera pose in the base frame)
/// from ground-plane geometry and odometry/marker co-visibility.
///
/// Runs the yaw and XY stages for both signs of the ground normal and keeps
/// the candidate with the smaller stacked XY residual.
///
/// Fails with [`CalibError::DegenerateGeometry`] when the yaw stage has no
/// small-rotation hyper-edge or the XY stage fewer than two large-rotation
/// hyper-edges; callers may fall back to a configured initial extrinsic and
/// still run the graph optimizer.
pub fn initialize_extrinsic(ds: &Dataset, cfg: &InitConfig) -> CalibResult<Iso3> {
    let n_cg = estimate_ground_plane(ds)?;

    let hyper = collect_hyper_edges(ds);
    let (small, large) = partition_by_rotation(ds, &hyper, cfg.small_rotation_ratio_threshold);
    debug!(
        "hyper-edges: {} total, {} small-rotation, {} large-rotation",
        hyper.len(),
        small.len(),
        large.len()
    );

    if small.is_empty() {
        return Err(CalibError::DegenerateGeometry(
            "no small-rotation hyper-edges; yaw unobservable".into(),
        ));
    }
    if large.len() < 2 {
        return Err(CalibError::DegenerateGeometry(format!(
            "{} large-rotation hyper-edges; planar translation underdetermined",
            large.len()
        )));
    }

    let pos = planar_offset(ds, &small, &large, camera_projection_frame(&n_cg))?;
    let neg = planar_offset(ds, &small, &large, camera_projection_frame(&-n_cg))?;
    debug!(
        "sign branches: +n residual {:.6e}, -n residual {:.6e}",
        pos.residual_norm, neg.residual_norm
    );

    let chosen = if pos.residual_norm < neg.residual_norm {
        pos
    } else {
        neg
    };

    let t_dc = Iso3::from_parts(
        Vec3::zeros().into(),
        nalgebra::UnitQuaternion::from_matrix(&chosen.r_dc),
    );
    let t_bd = Iso3::from_parts(
        chosen.t_bd.into(),
        nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::z_axis(), chosen.yaw),
    );
    Ok(t_bd * t_dc)
}

/// Yaw then XY extraction for one candidate projection frame.
fn planar_offset(
    ds: &Dataset,
    small: &[HyperEdge],
    large: &[HyperEdge],
    r_dc: Mat3,
) -> CalibResult<PlanarCandidate> {
    // Yaw: each small-rotation edge predicts the base translation up to an
    // unknown planar rotation; the yaw is the mean angular gap between the
    // measured and the predicted directions.
    let mut yaw_sum = 0.0;
    let mut yaw_count = 0usize;
    for e in small {
        let odo = &ds.odo_edges()[e.odo];
        let lifted = odo.meas.lift();
        let r_b1b2 = lifted.rotation.to_rotation_matrix().into_inner();
        let t_b1b2 = lifted.translation.vector;

        let t_c1m = ds.mark_edges()[e.mark1].meas;
        let t_c2m = ds.mark_edges()[e.mark2].meas;
        let t_bar = r_dc * t_c1m - r_b1b2 * r_dc * t_c2m;

        let yaw = wrap_pi(t_b1b2.y.atan2(t_b1b2.x) - t_bar.y.atan2(t_bar.x));
        if !yaw.is_finite() {
            continue;
        }
        yaw_sum += yaw;
        yaw_count += 1;
    }
    if yaw_count == 0 {
        return Err(CalibError::NumericFailure(
            "every small-rotation hyper-edge produced a non-finite yaw".into(),
        ));
    }
    let yaw = yaw_sum / yaw_count as Real;

    // XY: with the rotation fixed, each large-rotation edge contributes two
    // rows of (I - R_b1b2) t_bc = R_b1b2 R_bc t_c2m - R_bc t_c1m + t_b1b2.
    // The z-row is structurally zero for planar motion and is dropped.
    let r_bd = nalgebra::Rotation3::from_axis_angle(&nalgebra::Vector3::z_axis(), yaw)
        .into_inner();
    let r_bc = r_bd * r_dc;

    let mut a = DMatrix::<Real>::zeros(2 * large.len(), 2);
    let mut b = DMatrix::<Real>::zeros(2 * large.len(), 1);
    for (i, e) in large.iter().enumerate() {
        let odo = &ds.odo_edges()[e.odo];
        let lifted = odo.meas.lift();
        let r_b1b2 = lifted.rotation.to_rotation_matrix().into_inner();
        let t_b1b2 = lifted.translation.vector;

        let t_c1m = ds.mark_edges()[e.mark1].meas;
        let t_c2m = ds.mark_edges()[e.mark2].meas;

        let a_blk = Mat3::identity() - r_b1b2;
        let b_blk = r_b1b2 * r_bc * t_c2m - r_bc * t_c1m + t_b1b2;

        a.view_mut((2 * i, 0), (2, 2))
            .copy_from(&a_blk.fixed_view::<2, 2>(0, 0));
        b[(2 * i, 0)] = b_blk.x;
        b[(2 * i + 1, 0)] = b_blk.y;
    }

    let svd = a.clone().svd(true, true);
    let x = svd
        .solve(&b, 1e-12)
        .map_err(|_| CalibError::NumericFailure("svd solve failed in the XY stage".into()))?;
    let residual_norm = (&a * &x - &b).norm();
    if !residual_norm.is_finite() || !x[(0, 0)].is_finite() || !x[(1, 0)].is_finite() {
        return Err(CalibError::NumericFailure(
            "non-finite XY solution in the planar extrinsic stage".into(),
        ));
    }

    Ok(PlanarCandidate {
        r_dc,
        yaw,
        t_bd: Vec3::new(x[(0, 0)], x[(1, 0)], 0.0),
        residual_norm,
    })
}
