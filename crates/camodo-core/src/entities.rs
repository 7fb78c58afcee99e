//! Keyframe and landmark entities.
//!
//! Entities are owned by the [`crate::Dataset`]; edges refer to them through
//! the id newtypes below, never through references.

use serde::{Deserialize, Serialize};

use crate::math::{Iso3, Pt2, Pt3, Se2};

/// Stable keyframe handle. Ids are unique and totally ordered; odometry
/// edges exist only between consecutive ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct KfId(pub u32);

/// Stable landmark handle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LmId(pub u32);

/// Fiducial metadata attached to a marker landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiducialMeta {
    /// Detector-assigned marker id.
    pub marker_id: i32,
    /// Physical edge length in metres.
    pub size: f64,
}

/// A keyframe: one measured base pose and the observations taken there.
///
/// `odo` is the immutable odometry measurement; `pose_base` is the current
/// estimate (starts equal to `odo`, refined by the optimizer) and
/// `pose_camera` is derived from it through the extrinsic.
#[derive(Debug, Clone)]
pub struct Keyframe {
    pub id: KfId,
    odo: Se2,
    pub pose_base: Se2,
    pub pose_camera: Iso3,
    /// Undistorted pixel keypoints, present only in the visual variant.
    pub keypoints: Vec<Pt2>,
}

impl Keyframe {
    pub fn new(id: KfId, odo: Se2) -> Self {
        Self {
            id,
            odo,
            pose_base: odo,
            pose_camera: Iso3::identity(),
            keypoints: Vec::new(),
        }
    }

    pub fn with_keypoints(id: KfId, odo: Se2, keypoints: Vec<Pt2>) -> Self {
        Self {
            keypoints,
            ..Self::new(id, odo)
        }
    }

    /// The measured odometry pose; immutable for the lifetime of the entity.
    pub fn odo(&self) -> Se2 {
        self.odo
    }

    /// Set the base pose estimate and recompute the camera pose through the
    /// extrinsic `x_bc` (camera pose in base frame).
    pub fn set_pose_all_by_base(&mut self, base: Se2, x_bc: &Iso3) {
        self.pose_base = base;
        self.pose_camera = base.lift() * x_bc;
    }
}

/// A landmark: a 3D position in the world frame, plus fiducial metadata for
/// marker landmarks (visual map points carry none).
#[derive(Debug, Clone)]
pub struct Landmark {
    pub id: LmId,
    pub position: Pt3,
    pub fiducial: Option<FiducialMeta>,
}

impl Landmark {
    pub fn new(id: LmId, position: Pt3) -> Self {
        Self {
            id,
            position,
            fiducial: None,
        }
    }

    pub fn with_fiducial(id: LmId, position: Pt3, meta: FiducialMeta) -> Self {
        Self {
            id,
            position,
            fiducial: Some(meta),
        }
    }
}
