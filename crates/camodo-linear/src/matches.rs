//! Two-stage outlier rejection for pairwise keypoint matches.
//!
//! Stage one drops matches whose undistorted pixel displacement exceeds a
//! gate (a ground vehicle between consecutive keyframes produces bounded
//! flow); stage two drops epipolar outliers under an 8-point fundamental
//! model. Both stages require a minimum number of input matches and return
//! nothing below it.

use log::debug;

use camodo_core::{Keyframe, Pt2, RansacOptions, VisualConfig};

use crate::fundamental::fundamental_ransac;

/// A match is a pair of keypoint indices `(index in kf1, index in kf2)`.
pub type Match = (usize, usize);

/// Distance gate: keep matches whose undistorted keypoints moved at most
/// `distance_gate_px` pixels.
pub fn reject_outlier_dist(
    kf1: &Keyframe,
    kf2: &Keyframe,
    matches: &[Match],
    cfg: &VisualConfig,
) -> Vec<Match> {
    if matches.len() < cfg.min_matches {
        return Vec::new();
    }
    matches
        .iter()
        .copied()
        .filter(|&(i1, i2)| {
            let p1 = kf1.keypoints[i1];
            let p2 = kf2.keypoints[i2];
            (p1 - p2).norm() <= cfg.distance_gate_px
        })
        .collect()
}

/// Epipolar gate: keep the inliers of a fundamental-matrix RANSAC over the
/// undistorted keypoints. Returns nothing when RANSAC finds no consensus.
pub fn reject_outlier_ransac(
    kf1: &Keyframe,
    kf2: &Keyframe,
    matches: &[Match],
    cfg: &VisualConfig,
) -> Vec<Match> {
    if matches.len() < cfg.min_matches {
        return Vec::new();
    }

    let pts1: Vec<Pt2> = matches.iter().map(|&(i1, _)| kf1.keypoints[i1]).collect();
    let pts2: Vec<Pt2> = matches.iter().map(|&(_, i2)| kf2.keypoints[i2]).collect();

    let opts = RansacOptions {
        thresh: cfg.ransac_pixel_gate,
        confidence: cfg.ransac_confidence,
        min_inliers: 8,
        seed: cfg.ransac_seed,
        ..Default::default()
    };

    match fundamental_ransac(&pts1, &pts2, &opts) {
        Ok((_, inliers)) => inliers.into_iter().map(|i| matches[i]).collect(),
        Err(err) => {
            debug!("match filter: ransac stage produced no model ({})", err);
            Vec::new()
        }
    }
}

/// The full filter: distance gate, then fundamental-matrix RANSAC.
pub fn filter_matches(
    kf1: &Keyframe,
    kf2: &Keyframe,
    matches: &[Match],
    cfg: &VisualConfig,
) -> Vec<Match> {
    let gated = reject_outlier_dist(kf1, kf2, matches, cfg);
    debug!(
        "match filter: {} raw, {} after distance gate",
        matches.len(),
        gated.len()
    );
    let inliers = reject_outlier_ransac(kf1, kf2, &gated, cfg);
    debug!("match filter: {} after ransac", inliers.len());
    inliers
}
