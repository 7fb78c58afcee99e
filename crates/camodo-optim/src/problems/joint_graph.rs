//! Joint pose-graph construction and refinement.
//!
//! The graph carries one SE(3) block for the extrinsic, one SE(2) block per
//! keyframe and one 3D point block per observed landmark, tied together by
//! odometry and observation residuals. Insertion order is deterministic
//! (keyframes ascending, then landmarks ascending, edges in dataset order),
//! which pins the linear solver's pivoting and makes runs reproducible.
//!
//! The first keyframe block is held fixed to remove the planar gauge
//! freedom of the relative-only odometry chain.

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};
use nalgebra::DVector;

use camodo_core::{CalibError, CalibResult, Dataset, Iso3, KfId, LmId};

use crate::backend::{BackendKind, BackendSolution, BackendSolveOptions};
use crate::ir::{
    sqrt_information2, sqrt_information3, FactorKind, FixedMask, ManifoldKind, ProblemIR,
    ResidualBlock,
};
use crate::params::pose::{iso3_to_se3_dvec, se2_from_dvec, se2_to_dvec, se3_dvec_to_iso3};

fn kf_key(id: KfId) -> String {
    format!("kf/{}", id.0)
}

fn lm_key(id: LmId) -> String {
    format!("lm/{}", id.0)
}

/// Observation residuals surviving the finite-value screen, plus the set of
/// landmarks they reference.
struct ScreenedObservations {
    factors: Vec<(KfId, LmId, FactorKind)>,
    used_lms: BTreeSet<LmId>,
}

fn screen_marker_observations(ds: &Dataset) -> CalibResult<ScreenedObservations> {
    let mut factors = Vec::new();
    let mut used_lms = BTreeSet::new();
    for e in ds.mark_edges() {
        if ds.keyframe(e.kf).is_none() || ds.landmark(e.lm).is_none() {
            return Err(CalibError::InvariantViolation(format!(
                "marker edge references missing entity ({:?}, {:?})",
                e.kf, e.lm
            )));
        }
        if !(e.meas.iter().all(|v| v.is_finite()) && e.info.iter().all(|v| v.is_finite())) {
            warn!(
                "deactivating marker edge ({:?}, {:?}): non-finite measurement",
                e.kf, e.lm
            );
            continue;
        }
        let Some(sqrt_info) = sqrt_information3(&e.info) else {
            warn!(
                "deactivating marker edge ({:?}, {:?}): information not positive-definite",
                e.kf, e.lm
            );
            continue;
        };
        factors.push((
            e.kf,
            e.lm,
            FactorKind::MarkPoint3 {
                meas: [e.meas.x, e.meas.y, e.meas.z],
                sqrt_info,
            },
        ));
        used_lms.insert(e.lm);
    }
    Ok(ScreenedObservations { factors, used_lms })
}

fn screen_uv_observations(ds: &Dataset) -> CalibResult<ScreenedObservations> {
    let cam = ds.camera().ok_or_else(|| {
        CalibError::InvariantViolation("visual graph requires camera intrinsics".into())
    })?;
    let cam4 = [cam.fx, cam.fy, cam.cx, cam.cy];

    let mut factors = Vec::new();
    let mut used_lms = BTreeSet::new();
    for e in ds.uv_edges() {
        if ds.keyframe(e.kf).is_none() || ds.landmark(e.lm).is_none() {
            return Err(CalibError::InvariantViolation(format!(
                "uv edge references missing entity ({:?}, {:?})",
                e.kf, e.lm
            )));
        }
        if !(e.uv.coords.iter().all(|v| v.is_finite()) && e.info.iter().all(|v| v.is_finite())) {
            warn!(
                "deactivating uv edge ({:?}, {:?}): non-finite measurement",
                e.kf, e.lm
            );
            continue;
        }
        let Some(sqrt_info) = sqrt_information2(&e.info) else {
            warn!(
                "deactivating uv edge ({:?}, {:?}): information not positive-definite",
                e.kf, e.lm
            );
            continue;
        };
        factors.push((
            e.kf,
            e.lm,
            FactorKind::ReprojUv {
                uv: [e.uv.x, e.uv.y],
                cam: cam4,
                sqrt_info,
            },
        ));
        used_lms.insert(e.lm);
    }
    Ok(ScreenedObservations { factors, used_lms })
}

/// Assemble the IR shared by both variants from pre-screened observations.
fn build_ir(
    ds: &Dataset,
    x_bc: &Iso3,
    obs: ScreenedObservations,
) -> CalibResult<(ProblemIR, HashMap<String, DVector<f64>>)> {
    if ds.keyframes().is_empty() {
        return Err(CalibError::EmptyGraph("dataset has no keyframes".into()));
    }
    if ds.odo_edges().is_empty() {
        return Err(CalibError::EmptyGraph(
            "no odometry edges connect the keyframes".into(),
        ));
    }
    if obs.factors.is_empty() {
        return Err(CalibError::EmptyGraph(
            "no active observation edges; extrinsic unconstrained".into(),
        ));
    }

    let mut ir = ProblemIR::new();
    let mut initial = HashMap::new();

    let extr = ir.add_param_block("extr", 7, ManifoldKind::SE3, FixedMask::all_free());
    initial.insert("extr".to_string(), iso3_to_se3_dvec(x_bc));

    let mut kf_ids = HashMap::new();
    for (idx, (id, kf)) in ds.keyframes().iter().enumerate() {
        let fixed = if idx == 0 {
            FixedMask::all_fixed(3)
        } else {
            FixedMask::all_free()
        };
        let key = kf_key(*id);
        let pid = ir.add_param_block(&key, 3, ManifoldKind::Euclidean, fixed);
        kf_ids.insert(*id, pid);
        initial.insert(key, se2_to_dvec(&kf.pose_base));
    }

    let mut lm_ids = HashMap::new();
    for id in &obs.used_lms {
        let lm = ds
            .landmark(*id)
            .expect("screened observations only reference existing landmarks");
        let key = lm_key(*id);
        let pid = ir.add_param_block(&key, 3, ManifoldKind::Euclidean, FixedMask::all_free());
        lm_ids.insert(*id, pid);
        initial.insert(
            key,
            nalgebra::dvector![lm.position.x, lm.position.y, lm.position.z],
        );
    }

    let mut skipped_odo = 0usize;
    for e in ds.odo_edges() {
        let (Some(&head), Some(&tail)) = (kf_ids.get(&e.head), kf_ids.get(&e.tail)) else {
            return Err(CalibError::InvariantViolation(format!(
                "odometry edge references missing keyframe ({:?}, {:?})",
                e.head, e.tail
            )));
        };
        let finite = [e.meas.x, e.meas.y, e.meas.theta]
            .iter()
            .all(|v| v.is_finite())
            && e.info.iter().all(|v| v.is_finite());
        let sqrt_info = if finite { sqrt_information3(&e.info) } else { None };
        let Some(sqrt_info) = sqrt_info else {
            warn!(
                "deactivating odometry edge ({:?}, {:?}): bad measurement or information",
                e.head, e.tail
            );
            skipped_odo += 1;
            continue;
        };
        ir.add_residual_block(ResidualBlock {
            params: vec![head, tail],
            factor: FactorKind::OdoSe2 {
                meas: [e.meas.x, e.meas.y, e.meas.theta],
                sqrt_info,
            },
        });
    }
    if skipped_odo == ds.odo_edges().len() {
        return Err(CalibError::EmptyGraph(
            "every odometry edge was deactivated".into(),
        ));
    }

    for (kf, lm, factor) in obs.factors {
        let kf_pid = *kf_ids.get(&kf).expect("screened kf exists");
        let lm_pid = *lm_ids.get(&lm).expect("screened lm exists");
        ir.add_residual_block(ResidualBlock {
            params: vec![extr, kf_pid, lm_pid],
            factor,
        });
    }

    debug!(
        "joint graph: {} params, {} residuals",
        ir.params.len(),
        ir.residuals.len()
    );
    Ok((ir, initial))
}

/// Build the marker-variant graph (3D camera-frame observations).
pub fn build_marker_ir(
    ds: &Dataset,
    x_bc: &Iso3,
) -> CalibResult<(ProblemIR, HashMap<String, DVector<f64>>)> {
    build_ir(ds, x_bc, screen_marker_observations(ds)?)
}

/// Build the visual-variant graph (2D reprojection observations).
pub fn build_visual_ir(
    ds: &Dataset,
    x_bc: &Iso3,
) -> CalibResult<(ProblemIR, HashMap<String, DVector<f64>>)> {
    build_ir(ds, x_bc, screen_uv_observations(ds)?)
}

/// Write optimized estimates back into the dataset and return the refined
/// extrinsic.
fn apply_solution(ds: &mut Dataset, solution: &BackendSolution) -> CalibResult<Iso3> {
    let extr = solution
        .params
        .get("extr")
        .ok_or_else(|| CalibError::NumericFailure("solver dropped the extrinsic block".into()))?;
    let x_bc = se3_dvec_to_iso3(extr.as_view())
        .map_err(|e| CalibError::NumericFailure(e.to_string()))?;

    let kf_ids: Vec<KfId> = ds.keyframes().keys().copied().collect();
    for id in kf_ids {
        if let Some(v) = solution.params.get(&kf_key(id)) {
            let pose = se2_from_dvec(v.as_view())
                .map_err(|e| CalibError::NumericFailure(e.to_string()))?;
            ds.keyframe_mut(id)
                .expect("keyframe ids are stable across the solve")
                .set_pose_all_by_base(pose, &x_bc);
        }
    }

    let lm_ids: Vec<LmId> = ds.landmarks().keys().copied().collect();
    for id in lm_ids {
        if let Some(v) = solution.params.get(&lm_key(id)) {
            let lm = ds
                .landmark_mut(id)
                .expect("landmark ids are stable across the solve");
            lm.position = camodo_core::Pt3::new(v[0], v[1], v[2]);
        }
    }

    Ok(x_bc)
}

/// Run the marker-variant joint optimization and write back the estimates.
pub fn optimize_marker_graph(
    ds: &mut Dataset,
    x_bc: &Iso3,
    opts: &BackendSolveOptions,
) -> CalibResult<Iso3> {
    let (ir, initial) = build_marker_ir(ds, x_bc)?;
    let solution = BackendKind::TinySolver
        .solve(&ir, &initial, opts)
        .map_err(|e| CalibError::NumericFailure(e.to_string()))?;
    debug!("marker graph final cost {:.6e}", solution.final_cost);
    apply_solution(ds, &solution)
}

/// Run the visual-variant joint optimization and write back the estimates.
pub fn optimize_visual_graph(
    ds: &mut Dataset,
    x_bc: &Iso3,
    opts: &BackendSolveOptions,
) -> CalibResult<Iso3> {
    let (ir, initial) = build_visual_ir(ds, x_bc)?;
    let solution = BackendKind::TinySolver
        .solve(&ir, &initial, opts)
        .map_err(|e| CalibError::NumericFailure(e.to_string()))?;
    debug!("visual graph final cost {:.6e}", solution.final_cost);
    apply_solution(ds, &solution)
}
