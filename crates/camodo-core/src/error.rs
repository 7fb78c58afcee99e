//! Error kinds surfaced by the calibration pipeline.
//!
//! The solver never retries internally; every failure carries enough context
//! (offending entity ids) for the caller to act on it.

use thiserror::Error;

/// Calibration failure kinds.
#[derive(Debug, Clone, Error)]
pub enum CalibError {
    /// The closed-form initializer cannot solve: no ground-plane signal, no
    /// small-rotation hyper-edge for yaw, or fewer than two large-rotation
    /// hyper-edges for the XY stage. Callers may fall back to a configured
    /// initial extrinsic and still run the optimizer.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// No keyframes, or no edges connect them.
    #[error("empty graph: {0}")]
    EmptyGraph(String),

    /// SVD or the nonlinear solver produced non-finite values.
    #[error("numeric failure: {0}")]
    NumericFailure(String),

    /// An edge references an entity that is not in the dataset; indicates a
    /// collaborator bug.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result alias used across the workspace.
pub type CalibResult<T> = Result<T, CalibError>;
