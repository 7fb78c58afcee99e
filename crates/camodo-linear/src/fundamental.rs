//! Fundamental-matrix estimation for the visual match filter.
//!
//! Only the 8-point model is needed here: it seeds the RANSAC stage of the
//! outlier rejection, nothing downstream consumes the matrix itself.

use nalgebra::{DMatrix, SMatrix, Vector3};

use camodo_core::{
    ransac_fit, CalibError, CalibResult, Estimator, Mat3, Pt2, RansacOptions, Real,
};

/// 8-point algorithm for the fundamental matrix.
///
/// `pts1` and `pts2` are corresponding pixel points; the returned matrix is
/// forced to rank 2 and satisfies `x2^T F x1 ~ 0` up to numerical error.
pub fn fundamental_8point(pts1: &[Pt2], pts2: &[Pt2]) -> CalibResult<Mat3> {
    let n = pts1.len();
    if n < 8 || pts2.len() != n {
        return Err(CalibError::DegenerateGeometry(format!(
            "need at least 8 correspondences, got {} / {}",
            n,
            pts2.len()
        )));
    }

    // Design matrix for x2^T F x1 = 0, one row per correspondence,
    // zero-padded to square so the thin SVD exposes the null direction.
    let rows = n.max(9);
    let mut a = DMatrix::<Real>::zeros(rows, 9);
    for (i, (p1, p2)) in pts1.iter().zip(pts2.iter()).enumerate() {
        let (x, y) = (p1.x, p1.y);
        let (xp, yp) = (p2.x, p2.y);
        a[(i, 0)] = xp * x;
        a[(i, 1)] = xp * y;
        a[(i, 2)] = xp;
        a[(i, 3)] = yp * x;
        a[(i, 4)] = yp * y;
        a[(i, 5)] = yp;
        a[(i, 6)] = x;
        a[(i, 7)] = y;
        a[(i, 8)] = 1.0;
    }

    let svd = a.svd(true, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::NumericFailure("svd failed on the 8-point system".into()))?;
    let f_vec = v_t.row(v_t.nrows() - 1);

    let mut f = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            f[(r, c)] = f_vec[3 * r + c];
        }
    }

    // Enforce the rank-2 constraint.
    let svd_f = f.svd(true, true);
    let u = svd_f
        .u
        .ok_or_else(|| CalibError::NumericFailure("svd failed on rank-2 projection".into()))?;
    let v_t = svd_f
        .v_t
        .ok_or_else(|| CalibError::NumericFailure("svd failed on rank-2 projection".into()))?;
    let mut s = svd_f.singular_values;
    s[2] = 0.0;
    Ok(u * SMatrix::<Real, 3, 3>::from_diagonal(&s) * v_t)
}

#[derive(Clone)]
struct FDatum {
    x1: Pt2,
    x2: Pt2,
}

struct FundamentalEst;

impl Estimator for FundamentalEst {
    type Datum = FDatum;
    type Model = Mat3;

    const MIN_SAMPLES: usize = 8;

    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
        let p1: Vec<Pt2> = sample_indices.iter().map(|&i| data[i].x1).collect();
        let p2: Vec<Pt2> = sample_indices.iter().map(|&i| data[i].x2).collect();
        fundamental_8point(&p1, &p2).ok()
    }

    // Approximate symmetric epipolar distance in pixels.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> Real {
        let x = Vector3::new(datum.x1.x, datum.x1.y, 1.0);
        let xp = Vector3::new(datum.x2.x, datum.x2.y, 1.0);
        let fx = model * x;
        let ftxp = model.transpose() * xp;
        let denom = (fx.x * fx.x + fx.y * fx.y + ftxp.x * ftxp.x + ftxp.y * ftxp.y).max(1e-12);
        let val = (xp.transpose() * model * x)[0];
        (val * val / denom).sqrt()
    }
}

/// Robust fundamental-matrix fit; returns the model and the inlier indices.
pub fn fundamental_ransac(
    pts1: &[Pt2],
    pts2: &[Pt2],
    opts: &RansacOptions,
) -> CalibResult<(Mat3, Vec<usize>)> {
    let n = pts1.len();
    if n < 8 || pts2.len() != n {
        return Err(CalibError::DegenerateGeometry(format!(
            "need at least 8 correspondences, got {} / {}",
            n,
            pts2.len()
        )));
    }

    let data: Vec<FDatum> = pts1
        .iter()
        .zip(pts2.iter())
        .map(|(&x1, &x2)| FDatum { x1, x2 })
        .collect();

    let res = ransac_fit::<FundamentalEst>(&data, opts);
    if !res.success {
        return Err(CalibError::DegenerateGeometry(
            "fundamental-matrix RANSAC found no consensus".into(),
        ));
    }
    let f = res.model.expect("ransac success implies a model");
    Ok((f, res.inliers))
}
