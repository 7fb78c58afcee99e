//! Visual bootstrap: map points from filtered feature matches.
//!
//! Consecutive keyframe pairs are matched, filtered (distance gate, then
//! fundamental-matrix RANSAC), triangulated, and parallax-gated. Accepted
//! points become landmarks with one UV edge per observing keyframe; a
//! keypoint already bound to a landmark by an earlier pair reuses it, so
//! tracks spanning several keyframes share one landmark.

use log::debug;

use camodo_core::{
    CalibError, CalibResult, Dataset, Keyframe, KfId, Mat2, Pt2, VisualConfig,
};
use camodo_linear::{filter_matches, parallax_ok, triangulate_two_view};

/// Pure match provider; detection and descriptor matching live with
/// collaborators.
pub trait FeatureMatcher {
    /// Keypoint-index pairs `(index in a, index in b)`.
    fn matches(&self, a: &Keyframe, b: &Keyframe) -> Vec<(usize, usize)>;
}

/// Triangulate map points over all consecutive keyframe pairs and attach
/// their UV observations.
///
/// Keyframe camera poses must be current (run the keyframe refresh first);
/// triangulation uses them for the projection matrices and optical centres.
pub fn create_map_points(
    ds: &mut Dataset,
    matcher: &dyn FeatureMatcher,
    cfg: &VisualConfig,
) -> CalibResult<()> {
    let cam = *ds.camera().ok_or_else(|| {
        CalibError::InvariantViolation("visual bootstrap requires camera intrinsics".into())
    })?;
    let min_parallax_rad = cfg.min_parallax_deg.to_radians();

    let kf_ids: Vec<KfId> = ds.keyframes().keys().copied().collect();
    for pair in kf_ids.windows(2) {
        let (id1, id2) = (pair[0], pair[1]);

        // Immutable pass: match, filter, triangulate.
        let mut accepted: Vec<(usize, usize, Pt2, Pt2, camodo_core::Pt3)> = Vec::new();
        {
            let kf1 = ds.keyframe(id1).expect("ids from the keyframe map");
            let kf2 = ds.keyframe(id2).expect("ids from the keyframe map");

            let raw = matcher.matches(kf1, kf2);
            let good = filter_matches(kf1, kf2, &raw, cfg);
            debug!(
                "pair ({:?}, {:?}): {} raw matches, {} good",
                id1,
                id2,
                raw.len(),
                good.len()
            );

            let p1 = cam.projection_matrix(&kf1.pose_camera);
            let p2 = cam.projection_matrix(&kf2.pose_camera);
            let c1 = camodo_core::Pt3::from(kf1.pose_camera.translation.vector);
            let c2 = camodo_core::Pt3::from(kf2.pose_camera.translation.vector);

            for (i1, i2) in good {
                let uv1 = kf1.keypoints[i1];
                let uv2 = kf2.keypoints[i2];
                let Ok(world) = triangulate_two_view(&p1, &p2, &uv1, &uv2) else {
                    continue;
                };
                if parallax_ok(&c1, &c2, &world, min_parallax_rad) {
                    accepted.push((i1, i2, uv1, uv2, world));
                }
            }
        }

        // Mutable pass: create or reuse landmarks, attach observations.
        for (i1, i2, uv1, uv2, world) in accepted {
            let lm = match ds.landmark_by_keypoint(id1, i1) {
                Some(existing) => existing,
                None => ds.add_map_point(world),
            };
            if ds.landmark_by_keypoint(id1, i1).is_none() {
                ds.add_uv_observation(id1, lm, i1, uv1, Mat2::identity())?;
            }
            if ds.landmark_by_keypoint(id2, i2).is_none() {
                ds.add_uv_observation(id2, lm, i2, uv2, Mat2::identity())?;
            }
        }
    }

    debug!(
        "visual bootstrap: {} landmarks, {} uv edges",
        ds.landmarks().len(),
        ds.uv_edges().len()
    );
    Ok(())
}
