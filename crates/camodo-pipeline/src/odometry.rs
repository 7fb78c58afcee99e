//! Odometry edge construction.
//!
//! One SE(2) increment edge per adjacent keyframe pair, with a distance-
//! and rotation-aware diagonal information matrix.

use camodo_core::{
    CalibResult, Dataset, KfId, Mat3, OdoEdge, OdoNoiseConfig, Se2, Vec3,
};

/// Rebuild the dataset's odometry edges from the measured keyframe poses.
///
/// For each adjacent pair the measurement is the group right-difference of
/// the raw odometry poses. Standard deviations scale with the increment:
/// `sigma_xy = max(dist * lin_err_ratio, lin_err_min)` and
/// `sigma_theta = max(|dtheta| * rot_err_ratio, rot_err_min,
/// dist * rot_err_ratio_lin)`; the last term charges heading drift to long
/// translations.
pub fn build_odo_edges(ds: &mut Dataset, cfg: &OdoNoiseConfig) -> CalibResult<()> {
    ds.clear_odo_edges();

    let poses: Vec<(KfId, Se2)> = ds
        .keyframes()
        .iter()
        .map(|(id, kf)| (*id, kf.odo()))
        .collect();

    for pair in poses.windows(2) {
        let (head, head_odo) = pair[0];
        let (tail, tail_odo) = pair[1];
        let meas = Se2::inc(&head_odo, &tail_odo);

        let dist = meas.dist();
        let std_lin = (dist * cfg.lin_err_ratio).max(cfg.lin_err_min);
        let std_rot = (meas.theta_abs() * cfg.rot_err_ratio)
            .max(cfg.rot_err_min)
            .max(dist * cfg.rot_err_ratio_lin);

        let info = Mat3::from_diagonal(&Vec3::new(
            1.0 / (std_lin * std_lin),
            1.0 / (std_lin * std_lin),
            1.0 / (std_rot * std_rot),
        ));
        ds.add_odo_edge(OdoEdge {
            head,
            tail,
            meas,
            info,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camodo_core::Keyframe;

    fn dataset_from_poses(poses: &[Se2]) -> Dataset {
        let mut ds = Dataset::new();
        for (i, p) in poses.iter().enumerate() {
            ds.add_keyframe(Keyframe::new(KfId(i as u32), *p)).unwrap();
        }
        ds
    }

    #[test]
    fn measurement_is_the_exact_group_difference() {
        let poses = [
            Se2::new(0.0, 0.0, 0.0),
            Se2::new(1.0, 0.5, 0.4),
            Se2::new(1.5, 1.5, -0.9),
        ];
        let mut ds = dataset_from_poses(&poses);
        build_odo_edges(&mut ds, &OdoNoiseConfig::default()).unwrap();

        assert_eq!(ds.odo_edges().len(), 2);
        for (edge, pair) in ds.odo_edges().iter().zip(poses.windows(2)) {
            let expected = Se2::inc(&pair[0], &pair[1]);
            // Bit-exact: same inputs, same computation.
            assert_eq!(edge.meas, expected);
        }
    }

    #[test]
    fn information_is_diagonal_and_positive() {
        let mut ds = dataset_from_poses(&[Se2::default(), Se2::new(2.0, 0.0, 0.3)]);
        build_odo_edges(&mut ds, &OdoNoiseConfig::default()).unwrap();

        let info = ds.odo_edges()[0].info;
        for i in 0..3 {
            assert!(info[(i, i)] > 0.0);
            for j in 0..3 {
                if i != j {
                    assert_eq!(info[(i, j)], 0.0);
                }
            }
        }
    }

    #[test]
    fn long_translations_inflate_the_heading_deviation() {
        let cfg = OdoNoiseConfig::default();
        let mut short = dataset_from_poses(&[Se2::default(), Se2::new(0.1, 0.0, 0.0)]);
        let mut long = dataset_from_poses(&[Se2::default(), Se2::new(5.0, 0.0, 0.0)]);
        build_odo_edges(&mut short, &cfg).unwrap();
        build_odo_edges(&mut long, &cfg).unwrap();

        // Same zero rotation, but the longer edge carries less heading
        // information because sigma_theta grows with distance.
        let theta_info_short = short.odo_edges()[0].info[(2, 2)];
        let theta_info_long = long.odo_edges()[0].info[(2, 2)];
        assert!(theta_info_long < theta_info_short);
    }

    #[test]
    fn rebuild_replaces_previous_edges() {
        let mut ds = dataset_from_poses(&[Se2::default(), Se2::new(1.0, 0.0, 0.0)]);
        build_odo_edges(&mut ds, &OdoNoiseConfig::default()).unwrap();
        build_odo_edges(&mut ds, &OdoNoiseConfig::default()).unwrap();
        assert_eq!(ds.odo_edges().len(), 1);
    }
}
