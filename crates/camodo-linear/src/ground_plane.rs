//! Ground-plane recovery from marker observations.
//!
//! All markers sit on planes parallel to the physical ground, so every
//! camera-frame observation `t` of marker `m` satisfies `n · t - d_m = 0`
//! for a common unit normal `n` and per-marker offsets `d_m`. Stacking one
//! row per observation gives a homogeneous system whose null direction
//! carries the normal.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use camodo_core::{CalibError, CalibResult, Dataset, LmId, Real, Vec3};

/// Estimate the ground-plane normal in the camera frame.
///
/// Builds the observation-by-`(3 + M)` system and solves it by SVD with
/// one row per marker observation. Candidate directions are scored by
/// `sigma_i / ||v_i[0..3]||` rather than by the raw singular value: the
/// offset columns have unit scale while the position columns are metric, so
/// the residual must be normalised per unit of normal magnitude. Positions
/// are assumed to be in metres.
///
/// Fails with [`CalibError::DegenerateGeometry`] when there are too few
/// observations or no direction has signal in the first three columns.
pub fn estimate_ground_plane(ds: &Dataset) -> CalibResult<Vec3> {
    let edges = ds.mark_edges();
    if edges.is_empty() {
        return Err(CalibError::DegenerateGeometry(
            "no marker observations; ground plane unobservable".into(),
        ));
    }

    // Local column ids for landmarks, in first-appearance order.
    let mut lm_cols: BTreeMap<LmId, usize> = BTreeMap::new();
    for e in edges {
        let next = lm_cols.len();
        lm_cols.entry(e.lm).or_insert(next);
    }

    let rows = edges.len();
    let cols = 3 + lm_cols.len();
    if rows < 3 {
        return Err(CalibError::DegenerateGeometry(format!(
            "only {} marker observations; ground plane underdetermined",
            rows
        )));
    }

    let mut a = DMatrix::<Real>::zeros(rows.max(cols), cols);
    for (row, e) in edges.iter().enumerate() {
        a[(row, 0)] = e.meas.x;
        a[(row, 1)] = e.meas.y;
        a[(row, 2)] = e.meas.z;
        a[(row, 3 + lm_cols[&e.lm])] = 1.0;
    }
    // Zero-padding the matrix to square (when rows < cols) keeps the full
    // right singular basis available from the thin SVD.

    let svd = a.svd(true, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::NumericFailure("svd failed on ground-plane system".into()))?;

    let mut best: Option<(Real, Vec3)> = None;
    for i in 0..v_t.nrows() {
        let v = v_t.row(i);
        let normal = Vec3::new(v[0], v[1], v[2]);
        let norm = normal.norm();
        if norm < 1e-12 {
            continue;
        }
        let score = svd.singular_values[i] / norm;
        if !score.is_finite() {
            return Err(CalibError::NumericFailure(
                "non-finite singular value in ground-plane solve".into(),
            ));
        }
        if best.as_ref().is_none_or(|(s, _)| score < *s) {
            best = Some((score, normal / norm));
        }
    }

    best.map(|(_, n)| n).ok_or_else(|| {
        CalibError::DegenerateGeometry(
            "ground-plane system is rank-deficient in its normal columns".into(),
        )
    })
}
