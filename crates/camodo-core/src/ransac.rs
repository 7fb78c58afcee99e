//! Generic, model-agnostic RANSAC engine.
//!
//! Implement [`Estimator`] for a geometric model and call [`ransac_fit`].
//! The engine never panics: with insufficient data or no consensus it
//! returns a result with `success == false`.

use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};

use crate::math::Real;

/// Configuration for [`ransac_fit`].
#[derive(Debug, Clone)]
pub struct RansacOptions {
    /// Upper bound on iterations; the adaptive schedule may stop earlier.
    pub max_iters: usize,
    /// Inlier residual threshold, in the units of [`Estimator::residual`].
    pub thresh: Real,
    /// Minimum consensus size for a model to be accepted.
    pub min_inliers: usize,
    /// Confidence level driving the adaptive iteration bound.
    pub confidence: Real,
    /// RNG seed; runs are deterministic given the same seed and data.
    pub seed: u64,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            thresh: 2.0,
            min_inliers: 10,
            confidence: 0.99,
            seed: 1_234_567,
        }
    }
}

/// Output of a RANSAC run. `model` is `Some` iff `success`.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    pub success: bool,
    pub model: Option<M>,
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over the inlier set.
    pub inlier_rms: Real,
    pub iters: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            success: false,
            model: None,
            inliers: Vec::new(),
            inlier_rms: Real::INFINITY,
            iters: 0,
        }
    }
}

/// Minimal-sample model estimator consumed by [`ransac_fit`].
pub trait Estimator {
    type Datum;
    type Model;

    /// Number of samples needed to fit one model hypothesis.
    const MIN_SAMPLES: usize;

    /// Fit a model from the sampled indices; `None` on degenerate subsets.
    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of one datum under a model, in the same units
    /// as `RansacOptions::thresh`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> Real;
}

fn rms(vals: &[Real]) -> Real {
    if vals.is_empty() {
        return Real::INFINITY;
    }
    let ss: Real = vals.iter().map(|&v| v * v).sum();
    (ss / vals.len() as Real).sqrt()
}

/// Adaptive iteration bound from the current inlier ratio.
fn adaptive_iters(confidence: Real, inlier_ratio: Real, min_samples: usize, max_iters: usize) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n = ((1.0 - confidence).ln() / denom).ceil();
    (n as usize).min(max_iters)
}

/// Run RANSAC for an [`Estimator`] over `data`.
pub fn ransac_fit<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best = RansacResult::default();
    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut budget = opts.max_iters;

    let mut iter = 0;
    while iter < budget {
        iter += 1;
        let sample: Vec<usize> = all_indices
            .choose_multiple(&mut rng, E::MIN_SAMPLES)
            .copied()
            .collect();

        let Some(model) = E::fit(data, &sample) else {
            continue;
        };

        let mut inliers = Vec::with_capacity(data.len());
        let mut residuals = Vec::with_capacity(data.len());
        for (i, datum) in data.iter().enumerate() {
            let r = E::residual(&model, datum);
            if r <= opts.thresh {
                inliers.push(i);
                residuals.push(r);
            }
        }
        if inliers.len() < opts.min_inliers {
            continue;
        }

        let score = rms(&residuals);
        let better = !best.success
            || inliers.len() > best.inliers.len()
            || (inliers.len() == best.inliers.len() && score < best.inlier_rms);
        if better {
            let ratio = inliers.len() as Real / data.len() as Real;
            best = RansacResult {
                success: true,
                model: Some(model),
                inliers,
                inlier_rms: score,
                iters: iter,
            };
            budget = adaptive_iters(opts.confidence, ratio, E::MIN_SAMPLES, opts.max_iters).max(iter);
        }
    }

    best
}
