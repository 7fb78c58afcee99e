//! Hyper-edge assembly for the planar extrinsic extraction.
//!
//! A hyper-edge joins one odometry increment with the two observations of a
//! landmark co-visible from the increment's endpoint keyframes.

use camodo_core::{Dataset, KfId, LmId, Real};

/// Indices into the dataset's odometry and marker edge arrays forming one
/// joint constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HyperEdge {
    /// Index of the odometry edge in `Dataset::odo_edges`.
    pub odo: usize,
    /// Index of the head keyframe's observation in `Dataset::mark_edges`.
    pub mark1: usize,
    /// Index of the tail keyframe's observation in `Dataset::mark_edges`.
    pub mark2: usize,
    /// The shared landmark.
    pub lm: LmId,
}

/// Landmarks observed from both keyframes, ascending by id.
pub fn covisible_landmarks(ds: &Dataset, kf1: KfId, kf2: KfId) -> Vec<LmId> {
    let set1 = ds.landmarks_by_kf(kf1);
    let set2 = ds.landmarks_by_kf(kf2);
    set1.intersection(&set2).copied().collect()
}

/// One hyper-edge per (odometry edge, co-visible landmark) pair.
///
/// Output order is deterministic: odometry edges in their stored order
/// (ascending keyframe ids), landmarks ascending within each.
pub fn collect_hyper_edges(ds: &Dataset) -> Vec<HyperEdge> {
    let mut edges = Vec::new();
    for (odo_idx, odo) in ds.odo_edges().iter().enumerate() {
        for lm in covisible_landmarks(ds, odo.head, odo.tail) {
            // Both lookups succeed by construction of the covisible set.
            let m1 = ds.mark_edge_index(odo.head, lm);
            let m2 = ds.mark_edge_index(odo.tail, lm);
            if let (Some(mark1), Some(mark2)) = (m1, m2) {
                edges.push(HyperEdge {
                    odo: odo_idx,
                    mark1,
                    mark2,
                    lm,
                });
            }
        }
    }
    edges
}

/// Split hyper-edges by the odometry rotation-per-distance ratio.
///
/// Edges with `|ratio| < thresh` (radians per metre) feed the yaw stage;
/// the rest, including in-place rotations (infinite ratio), feed the XY
/// stage.
pub fn partition_by_rotation(
    ds: &Dataset,
    edges: &[HyperEdge],
    thresh: Real,
) -> (Vec<HyperEdge>, Vec<HyperEdge>) {
    let mut small = Vec::new();
    let mut large = Vec::new();
    for &e in edges {
        let ratio = ds.odo_edges()[e.odo].meas.ratio();
        if ratio.abs() < thresh {
            small.push(e);
        } else {
            large.push(e);
        }
    }
    (small, large)
}
