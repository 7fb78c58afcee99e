//! Refresh and bootstrap of derived poses.
//!
//! Both functions are idempotent given fixed inputs: running them twice in
//! a row changes nothing.

use camodo_core::{Dataset, Iso3, LmId, Pt3};

/// Recompute every keyframe's camera pose from its current base pose and
/// the extrinsic: `camera = lift(base) * x_bc`.
pub fn refresh_kf_poses(ds: &mut Dataset, x_bc: &Iso3) {
    for kf in ds.keyframes_mut() {
        let base = kf.pose_base;
        kf.set_pose_all_by_base(base, x_bc);
    }
}

/// Seed every marker landmark's world position from its first observation:
/// `position = camera_pose(first observing keyframe) * measured_vector`.
///
/// Requires keyframe camera poses to be current (call
/// [`refresh_kf_poses`] first, or use [`refresh_all_poses`]).
pub fn refresh_mark_poses(ds: &mut Dataset) {
    let lm_ids: Vec<LmId> = ds.landmarks().keys().copied().collect();
    for lm in lm_ids {
        let Some(edge) = ds.first_mark_edge(lm) else {
            continue;
        };
        let kf = edge.kf;
        let meas = edge.meas;
        let cam_world = ds
            .keyframe(kf)
            .expect("mark edges reference existing keyframes")
            .pose_camera;
        let world = cam_world.transform_point(&Pt3::from(meas));
        ds.landmark_mut(lm)
            .expect("landmark ids are stable")
            .position = world;
    }
}

/// Keyframe refresh followed by landmark refresh.
pub fn refresh_all_poses(ds: &mut Dataset, x_bc: &Iso3) {
    refresh_kf_poses(ds, x_bc);
    refresh_mark_poses(ds);
}
