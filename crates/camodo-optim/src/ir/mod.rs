//! Backend-agnostic factor-graph representation.
//!
//! Backends compile this IR into solver-native problems; the calibration
//! drivers never talk to a nonlinear-least-squares library directly.

use anyhow::{ensure, Result};
use std::collections::HashSet;

use camodo_core::{Mat2, Mat3};

/// Identifier for a parameter block, stable within one [`ProblemIR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub usize);

/// Supported manifold types for parameter blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifoldKind {
    /// Standard Euclidean vector space. Planar poses `(x, y, theta)` live
    /// here; the angle is wrapped inside the residuals.
    Euclidean,
    /// SE(3) pose stored as `[qx, qy, qz, qw, tx, ty, tz]`.
    SE3,
}

impl ManifoldKind {
    /// Whether the ambient dimension matches the manifold storage.
    pub fn compatible_dim(self, dim: usize) -> bool {
        match self {
            ManifoldKind::Euclidean => true,
            ManifoldKind::SE3 => dim == 7,
        }
    }
}

/// Per-index fixing for a parameter block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixedMask {
    fixed_indices: HashSet<usize>,
}

impl FixedMask {
    pub fn all_free() -> Self {
        Self::default()
    }

    pub fn all_fixed(dim: usize) -> Self {
        Self {
            fixed_indices: (0..dim).collect(),
        }
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed_indices.contains(&idx)
    }

    pub fn is_all_fixed(&self, dim: usize) -> bool {
        self.fixed_indices.len() == dim
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed_indices.iter().copied()
    }
}

/// Factor kinds of the calibration graphs.
///
/// Measurements and square-root information are baked into the factor;
/// parameter layouts are implied by the kind and checked by
/// [`ProblemIR::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum FactorKind {
    /// SE(2) odometry increment between two keyframe pose blocks.
    ///
    /// Parameters: `[kf_head(3), kf_tail(3)]`; residual 3.
    OdoSe2 { meas: [f64; 3], sqrt_info: [f64; 9] },
    /// Camera-frame landmark position observed from one keyframe.
    ///
    /// Parameters: `[extrinsic(7), kf(3), lm(3)]`; residual 3.
    MarkPoint3 { meas: [f64; 3], sqrt_info: [f64; 9] },
    /// Pixel reprojection of a map point through fixed intrinsics.
    ///
    /// Parameters: `[extrinsic(7), kf(3), lm(3)]`; residual 2.
    ReprojUv {
        uv: [f64; 2],
        cam: [f64; 4],
        sqrt_info: [f64; 4],
    },
}

impl FactorKind {
    pub fn residual_dim(&self) -> usize {
        match self {
            FactorKind::OdoSe2 { .. } => 3,
            FactorKind::MarkPoint3 { .. } => 3,
            FactorKind::ReprojUv { .. } => 2,
        }
    }
}

/// Parameter block definition.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub dim: usize,
    pub manifold: ManifoldKind,
    pub fixed: FixedMask,
}

/// Residual block definition; `params` order must match the factor's
/// expected layout.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub params: Vec<ParamId>,
    pub factor: FactorKind,
}

/// Backend-agnostic optimization problem.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_param_block(
        &mut self,
        name: impl Into<String>,
        dim: usize,
        manifold: ManifoldKind,
        fixed: FixedMask,
    ) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(ParamBlock {
            id,
            name: name.into(),
            dim,
            manifold,
            fixed,
        });
        id
    }

    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    pub fn param_by_name(&self, name: &str) -> Option<ParamId> {
        self.params.iter().find(|p| p.name == name).map(|p| p.id)
    }

    /// Check internal consistency and per-factor parameter layouts.
    pub fn validate(&self) -> Result<()> {
        for (idx, param) in self.params.iter().enumerate() {
            ensure!(
                param.id.0 == idx,
                "block `{}` sits at slot {} but carries id {:?}",
                param.name,
                idx,
                param.id
            );
            ensure!(
                param.manifold.compatible_dim(param.dim),
                "block `{}` is {}-dimensional, which does not fit manifold {:?}",
                param.name,
                param.dim,
                param.manifold
            );
            for fixed_idx in param.fixed.iter() {
                ensure!(
                    fixed_idx < param.dim,
                    "block `{}` fixes index {} beyond its {} entries",
                    param.name,
                    fixed_idx,
                    param.dim
                );
            }
        }

        for (r_idx, residual) in self.residuals.iter().enumerate() {
            for param in &residual.params {
                ensure!(
                    param.0 < self.params.len(),
                    "residual {} points at {:?}, but only {} blocks exist",
                    r_idx,
                    param,
                    self.params.len()
                );
            }
            match &residual.factor {
                FactorKind::OdoSe2 { .. } => {
                    ensure!(
                        residual.params.len() == 2,
                        "odometry factor requires 2 params [head, tail]"
                    );
                    for id in &residual.params {
                        let p = &self.params[id.0];
                        ensure!(
                            p.dim == 3 && p.manifold == ManifoldKind::Euclidean,
                            "odometry factor expects 3D Euclidean pose, got dim={} manifold={:?}",
                            p.dim,
                            p.manifold
                        );
                    }
                }
                FactorKind::MarkPoint3 { .. } | FactorKind::ReprojUv { .. } => {
                    ensure!(
                        residual.params.len() == 3,
                        "observation factor requires 3 params [extrinsic, kf, lm]"
                    );
                    let extr = &self.params[residual.params[0].0];
                    let kf = &self.params[residual.params[1].0];
                    let lm = &self.params[residual.params[2].0];
                    ensure!(
                        extr.dim == 7 && extr.manifold == ManifoldKind::SE3,
                        "observation factor expects 7D SE3 extrinsic, got dim={} manifold={:?}",
                        extr.dim,
                        extr.manifold
                    );
                    ensure!(
                        kf.dim == 3 && kf.manifold == ManifoldKind::Euclidean,
                        "observation factor expects 3D Euclidean pose, got dim={} manifold={:?}",
                        kf.dim,
                        kf.manifold
                    );
                    ensure!(
                        lm.dim == 3 && lm.manifold == ManifoldKind::Euclidean,
                        "observation factor expects 3D Euclidean point, got dim={} manifold={:?}",
                        lm.dim,
                        lm.manifold
                    );
                }
            }
        }
        Ok(())
    }
}

/// Upper-triangular square root `W = L^T` of a 3×3 information matrix
/// (`info = L L^T`), row-major. Whitened residual `W r` reproduces the
/// Mahalanobis norm.
pub fn sqrt_information3(info: &Mat3) -> Option<[f64; 9]> {
    let chol = info.cholesky()?;
    let w = chol.l().transpose();
    let mut out = [0.0; 9];
    for r in 0..3 {
        for c in 0..3 {
            out[3 * r + c] = w[(r, c)];
        }
    }
    Some(out)
}

/// Upper-triangular square root of a 2×2 information matrix, row-major.
pub fn sqrt_information2(info: &Mat2) -> Option<[f64; 4]> {
    let chol = info.cholesky()?;
    let w = chol.l().transpose();
    Some([w[(0, 0)], w[(0, 1)], w[(1, 0)], w[(1, 1)]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use camodo_core::Vec3;

    #[test]
    fn validate_accepts_a_wellformed_graph() {
        let mut ir = ProblemIR::new();
        let extr = ir.add_param_block("extr", 7, ManifoldKind::SE3, FixedMask::all_free());
        let kf0 = ir.add_param_block("kf/0", 3, ManifoldKind::Euclidean, FixedMask::all_fixed(3));
        let kf1 = ir.add_param_block("kf/1", 3, ManifoldKind::Euclidean, FixedMask::all_free());
        let lm = ir.add_param_block("lm/0", 3, ManifoldKind::Euclidean, FixedMask::all_free());

        ir.add_residual_block(ResidualBlock {
            params: vec![kf0, kf1],
            factor: FactorKind::OdoSe2 {
                meas: [1.0, 0.0, 0.0],
                sqrt_info: sqrt_information3(&Mat3::identity()).unwrap(),
            },
        });
        ir.add_residual_block(ResidualBlock {
            params: vec![extr, kf0, lm],
            factor: FactorKind::MarkPoint3 {
                meas: [0.0, 0.0, 2.0],
                sqrt_info: sqrt_information3(&Mat3::identity()).unwrap(),
            },
        });

        ir.validate().unwrap();
    }

    #[test]
    fn validate_rejects_wrong_layout() {
        let mut ir = ProblemIR::new();
        let kf0 = ir.add_param_block("kf/0", 3, ManifoldKind::Euclidean, FixedMask::all_free());
        ir.add_residual_block(ResidualBlock {
            params: vec![kf0],
            factor: FactorKind::OdoSe2 {
                meas: [0.0; 3],
                sqrt_info: [0.0; 9],
            },
        });
        assert!(ir.validate().is_err());
    }

    #[test]
    fn sqrt_information_reproduces_the_quadratic_form() {
        let info = Mat3::from_diagonal(&Vec3::new(4.0, 9.0, 0.25));
        let w = sqrt_information3(&info).unwrap();
        let r = Vec3::new(0.3, -0.2, 1.5);
        let wr = Vec3::new(
            w[0] * r.x + w[1] * r.y + w[2] * r.z,
            w[3] * r.x + w[4] * r.y + w[5] * r.z,
            w[6] * r.x + w[7] * r.y + w[8] * r.z,
        );
        let mahalanobis = (r.transpose() * info * r)[0];
        assert!((wr.norm_squared() - mahalanobis).abs() < 1e-12);
    }

    #[test]
    fn sqrt_information_rejects_indefinite_matrices() {
        let info = Mat3::from_diagonal(&Vec3::new(1.0, -1.0, 1.0));
        assert!(sqrt_information3(&info).is_none());
    }
}
