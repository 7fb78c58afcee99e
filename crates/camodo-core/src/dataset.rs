//! The dataset arena: owns every entity and edge, maintains lookup indices.
//!
//! Entities are keyed by stable id newtypes; edges hold ids, never
//! references. All maps are ordered so that iteration (and therefore edge
//! insertion into the optimizer) is deterministic by ascending id.

use std::collections::{BTreeMap, BTreeSet};

use crate::camera::CameraModel;
use crate::config::MarkNoiseConfig;
use crate::entities::{FiducialMeta, Keyframe, KfId, Landmark, LmId};
use crate::error::{CalibError, CalibResult};
use crate::math::{Mat2, Pt2, Pt3, Real, Vec3};
use crate::measure::{marker_information, MarkEdge, OdoEdge, UvEdge};

/// Owns keyframes, landmarks and all measurement edges.
///
/// Solvers borrow a `Dataset` mutably for the duration of a calibration run
/// and write refined poses/positions back into it; they never take
/// ownership.
#[derive(Debug, Default)]
pub struct Dataset {
    camera: Option<CameraModel>,
    keyframes: BTreeMap<KfId, Keyframe>,
    landmarks: BTreeMap<LmId, Landmark>,
    odo_edges: Vec<OdoEdge>,
    mark_edges: Vec<MarkEdge>,
    uv_edges: Vec<UvEdge>,

    // Lookup indices, kept in sync on every mutation.
    lms_by_kf: BTreeMap<KfId, BTreeSet<LmId>>,
    mark_edge_by_kf_lm: BTreeMap<(KfId, LmId), usize>,
    lm_by_kf_kp: BTreeMap<(KfId, usize), LmId>,
    lm_by_marker_id: BTreeMap<i32, LmId>,
    next_lm_id: u32,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dataset carrying camera intrinsics, required by the visual variant.
    pub fn with_camera(camera: CameraModel) -> Self {
        Self {
            camera: Some(camera),
            ..Self::default()
        }
    }

    pub fn camera(&self) -> Option<&CameraModel> {
        self.camera.as_ref()
    }

    // ---- keyframes ----

    pub fn add_keyframe(&mut self, kf: Keyframe) -> CalibResult<()> {
        let id = kf.id;
        if self.keyframes.insert(id, kf).is_some() {
            return Err(CalibError::InvariantViolation(format!(
                "duplicate keyframe id {:?}",
                id
            )));
        }
        Ok(())
    }

    /// Ordered map of keyframes by ascending id.
    pub fn keyframes(&self) -> &BTreeMap<KfId, Keyframe> {
        &self.keyframes
    }

    pub fn keyframe(&self, id: KfId) -> Option<&Keyframe> {
        self.keyframes.get(&id)
    }

    pub fn keyframe_mut(&mut self, id: KfId) -> Option<&mut Keyframe> {
        self.keyframes.get_mut(&id)
    }

    /// Mutable iteration over keyframes in ascending-id order.
    pub fn keyframes_mut(&mut self) -> impl Iterator<Item = &mut Keyframe> {
        self.keyframes.values_mut()
    }

    // ---- landmarks ----

    pub fn landmarks(&self) -> &BTreeMap<LmId, Landmark> {
        &self.landmarks
    }

    pub fn landmark(&self, id: LmId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    pub fn landmark_mut(&mut self, id: LmId) -> Option<&mut Landmark> {
        self.landmarks.get_mut(&id)
    }

    /// Insert a bare map point (visual variant) and return its handle.
    pub fn add_map_point(&mut self, position: Pt3) -> LmId {
        let id = LmId(self.next_lm_id);
        self.next_lm_id += 1;
        self.landmarks.insert(id, Landmark::new(id, position));
        id
    }

    /// Landmarks observed by a keyframe, sorted by ascending id.
    ///
    /// Returns an empty set for keyframes without observations.
    pub fn landmarks_by_kf(&self, kf: KfId) -> BTreeSet<LmId> {
        self.lms_by_kf.get(&kf).cloned().unwrap_or_default()
    }

    /// The map point already associated with a keypoint of `kf`, if any.
    pub fn landmark_by_keypoint(&self, kf: KfId, kp_index: usize) -> Option<LmId> {
        self.lm_by_kf_kp.get(&(kf, kp_index)).copied()
    }

    // ---- marker observations ----

    /// Ingest one fiducial observation for `kf`.
    ///
    /// The landmark is created on the marker's first observation and reused
    /// afterwards; the edge information is depth-scaled per `noise`. A
    /// second observation of the same marker from the same keyframe is a
    /// collaborator bug.
    pub fn add_mark_observation(
        &mut self,
        kf: KfId,
        marker_id: i32,
        size: Real,
        tvec: Vec3,
        noise: &MarkNoiseConfig,
    ) -> CalibResult<LmId> {
        if !self.keyframes.contains_key(&kf) {
            return Err(CalibError::InvariantViolation(format!(
                "marker observation references missing keyframe {:?}",
                kf
            )));
        }

        let lm = match self.lm_by_marker_id.get(&marker_id) {
            Some(&lm) => lm,
            None => {
                let lm = LmId(self.next_lm_id);
                self.next_lm_id += 1;
                self.landmarks.insert(
                    lm,
                    Landmark::with_fiducial(
                        lm,
                        Pt3::origin(),
                        FiducialMeta { marker_id, size },
                    ),
                );
                self.lm_by_marker_id.insert(marker_id, lm);
                lm
            }
        };

        if self.mark_edge_by_kf_lm.contains_key(&(kf, lm)) {
            return Err(CalibError::InvariantViolation(format!(
                "duplicate marker observation ({:?}, {:?})",
                kf, lm
            )));
        }

        let info = marker_information(
            tvec.z,
            noise.xy_err_ratio_z,
            noise.xy_err_min,
            noise.z_err_ratio_z,
            noise.z_err_min,
        );
        let idx = self.mark_edges.len();
        self.mark_edges.push(MarkEdge {
            kf,
            lm,
            meas: tvec,
            info,
        });
        self.mark_edge_by_kf_lm.insert((kf, lm), idx);
        self.lms_by_kf.entry(kf).or_default().insert(lm);
        Ok(lm)
    }

    pub fn mark_edges(&self) -> &[MarkEdge] {
        &self.mark_edges
    }

    /// The unique marker observation of `lm` from `kf`, if one exists.
    pub fn mark_edge(&self, kf: KfId, lm: LmId) -> Option<&MarkEdge> {
        self.mark_edge_by_kf_lm
            .get(&(kf, lm))
            .map(|&idx| &self.mark_edges[idx])
    }

    /// Index of the unique `(kf, lm)` observation in [`Dataset::mark_edges`].
    pub fn mark_edge_index(&self, kf: KfId, lm: LmId) -> Option<usize> {
        self.mark_edge_by_kf_lm.get(&(kf, lm)).copied()
    }

    /// The first (lowest keyframe id) observation of a landmark.
    pub fn first_mark_edge(&self, lm: LmId) -> Option<&MarkEdge> {
        self.mark_edge_by_kf_lm
            .iter()
            .find(|((_, l), _)| *l == lm)
            .map(|(_, &idx)| &self.mark_edges[idx])
    }

    // ---- visual observations ----

    pub fn add_uv_observation(
        &mut self,
        kf: KfId,
        lm: LmId,
        kp_index: usize,
        uv: Pt2,
        info: Mat2,
    ) -> CalibResult<()> {
        if !self.keyframes.contains_key(&kf) {
            return Err(CalibError::InvariantViolation(format!(
                "uv observation references missing keyframe {:?}",
                kf
            )));
        }
        if !self.landmarks.contains_key(&lm) {
            return Err(CalibError::InvariantViolation(format!(
                "uv observation references missing landmark {:?}",
                lm
            )));
        }
        self.uv_edges.push(UvEdge {
            kf,
            lm,
            kp_index,
            uv,
            info,
        });
        self.lms_by_kf.entry(kf).or_default().insert(lm);
        self.lm_by_kf_kp.insert((kf, kp_index), lm);
        Ok(())
    }

    pub fn uv_edges(&self) -> &[UvEdge] {
        &self.uv_edges
    }

    // ---- odometry edges ----

    /// Odometry edges are rebuilt from scratch by the edge builder.
    pub fn clear_odo_edges(&mut self) {
        self.odo_edges.clear();
    }

    pub fn add_odo_edge(&mut self, edge: OdoEdge) -> CalibResult<()> {
        for id in [edge.head, edge.tail] {
            if !self.keyframes.contains_key(&id) {
                return Err(CalibError::InvariantViolation(format!(
                    "odometry edge references missing keyframe {:?}",
                    id
                )));
            }
        }
        self.odo_edges.push(edge);
        Ok(())
    }

    pub fn odo_edges(&self) -> &[OdoEdge] {
        &self.odo_edges
    }

    // ---- removal ----

    /// Remove a landmark and every edge that observes it.
    pub fn remove_landmark(&mut self, lm: LmId) {
        if self.landmarks.remove(&lm).is_none() {
            return;
        }
        self.lm_by_marker_id.retain(|_, l| *l != lm);
        self.mark_edges.retain(|e| e.lm != lm);
        self.uv_edges.retain(|e| e.lm != lm);
        self.rebuild_indices();
    }

    /// Remove a keyframe and every edge incident to it.
    pub fn remove_keyframe(&mut self, kf: KfId) {
        if self.keyframes.remove(&kf).is_none() {
            return;
        }
        self.odo_edges.retain(|e| e.head != kf && e.tail != kf);
        self.mark_edges.retain(|e| e.kf != kf);
        self.uv_edges.retain(|e| e.kf != kf);
        self.rebuild_indices();
    }

    fn rebuild_indices(&mut self) {
        self.lms_by_kf.clear();
        self.mark_edge_by_kf_lm.clear();
        self.lm_by_kf_kp.clear();
        for (idx, e) in self.mark_edges.iter().enumerate() {
            self.lms_by_kf.entry(e.kf).or_default().insert(e.lm);
            self.mark_edge_by_kf_lm.insert((e.kf, e.lm), idx);
        }
        for e in &self.uv_edges {
            self.lms_by_kf.entry(e.kf).or_default().insert(e.lm);
            self.lm_by_kf_kp.insert((e.kf, e.kp_index), e.lm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Se2;

    fn noise() -> MarkNoiseConfig {
        MarkNoiseConfig::default()
    }

    fn dataset_with_kfs(n: u32) -> Dataset {
        let mut ds = Dataset::new();
        for i in 0..n {
            ds.add_keyframe(Keyframe::new(KfId(i), Se2::new(i as f64, 0.0, 0.0)))
                .unwrap();
        }
        ds
    }

    #[test]
    fn duplicate_keyframe_id_is_rejected() {
        let mut ds = dataset_with_kfs(1);
        let err = ds
            .add_keyframe(Keyframe::new(KfId(0), Se2::default()))
            .unwrap_err();
        assert!(matches!(err, CalibError::InvariantViolation(_)));
    }

    #[test]
    fn marker_landmark_created_once_and_reused() {
        let mut ds = dataset_with_kfs(2);
        let lm_a = ds
            .add_mark_observation(KfId(0), 7, 0.2, Vec3::new(0.0, 0.0, 2.0), &noise())
            .unwrap();
        let lm_b = ds
            .add_mark_observation(KfId(1), 7, 0.2, Vec3::new(0.1, 0.0, 2.0), &noise())
            .unwrap();
        assert_eq!(lm_a, lm_b);
        assert_eq!(ds.landmarks().len(), 1);
        assert_eq!(ds.mark_edges().len(), 2);
        assert!(ds.mark_edge(KfId(0), lm_a).is_some());
        assert!(ds.mark_edge(KfId(1), lm_a).is_some());
    }

    #[test]
    fn duplicate_observation_from_same_keyframe_is_rejected() {
        let mut ds = dataset_with_kfs(1);
        ds.add_mark_observation(KfId(0), 7, 0.2, Vec3::new(0.0, 0.0, 2.0), &noise())
            .unwrap();
        let err = ds
            .add_mark_observation(KfId(0), 7, 0.2, Vec3::new(0.0, 0.0, 2.1), &noise())
            .unwrap_err();
        assert!(matches!(err, CalibError::InvariantViolation(_)));
    }

    #[test]
    fn landmarks_by_kf_is_sorted_by_id() {
        let mut ds = dataset_with_kfs(1);
        for marker in [9, 3, 5] {
            ds.add_mark_observation(KfId(0), marker, 0.2, Vec3::new(0.0, 0.0, 1.0), &noise())
                .unwrap();
        }
        let ids: Vec<LmId> = ds.landmarks_by_kf(KfId(0)).into_iter().collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn odo_edge_to_missing_keyframe_is_rejected() {
        let mut ds = dataset_with_kfs(1);
        let err = ds
            .add_odo_edge(OdoEdge {
                head: KfId(0),
                tail: KfId(1),
                meas: Se2::default(),
                info: crate::math::Mat3::identity(),
            })
            .unwrap_err();
        assert!(matches!(err, CalibError::InvariantViolation(_)));
    }

    #[test]
    fn removing_a_landmark_drops_dependent_edges() {
        let mut ds = dataset_with_kfs(2);
        let lm = ds
            .add_mark_observation(KfId(0), 7, 0.2, Vec3::new(0.0, 0.0, 2.0), &noise())
            .unwrap();
        ds.add_mark_observation(KfId(1), 7, 0.2, Vec3::new(0.1, 0.0, 2.0), &noise())
            .unwrap();
        ds.add_mark_observation(KfId(1), 8, 0.2, Vec3::new(0.2, 0.0, 2.0), &noise())
            .unwrap();

        ds.remove_landmark(lm);

        assert_eq!(ds.landmarks().len(), 1);
        assert_eq!(ds.mark_edges().len(), 1);
        assert!(ds.mark_edge(KfId(1), lm).is_none());
        assert!(!ds.landmarks_by_kf(KfId(1)).contains(&lm));
    }

    #[test]
    fn removing_a_keyframe_drops_incident_edges() {
        let mut ds = dataset_with_kfs(3);
        for pair in [(0u32, 1u32), (1, 2)] {
            let head = KfId(pair.0);
            let tail = KfId(pair.1);
            let meas = Se2::inc(
                &ds.keyframe(head).unwrap().odo(),
                &ds.keyframe(tail).unwrap().odo(),
            );
            ds.add_odo_edge(OdoEdge {
                head,
                tail,
                meas,
                info: crate::math::Mat3::identity(),
            })
            .unwrap();
        }
        ds.add_mark_observation(KfId(1), 7, 0.2, Vec3::new(0.0, 0.0, 2.0), &noise())
            .unwrap();

        ds.remove_keyframe(KfId(1));

        assert!(ds.odo_edges().is_empty());
        assert!(ds.mark_edges().is_empty());
    }
}
