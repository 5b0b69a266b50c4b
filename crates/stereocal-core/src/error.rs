//! Error taxonomy for the calibration pipeline.
//!
//! Detection misses are deliberately not part of this enum: the extractor
//! reports them as `Ok(None)` and the accumulation loop skips the frame.

use thiserror::Error;

/// Errors produced by calibration stages.
#[derive(Debug, Error)]
pub enum CalibError {
    /// Caller-supplied configuration is unusable (non-positive grid size,
    /// zero refinement window, alpha outside [0, 1], ...).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Not enough observations for a well-posed solve. Recoverable by
    /// collecting more data and retrying.
    #[error("insufficient correspondences: got {got}, need at least {need}")]
    InsufficientCorrespondences { got: usize, need: usize },

    /// The nonlinear solver stopped without meeting its convergence
    /// criteria. Distinct from insufficient data so callers can decide
    /// whether to add observations or loosen tolerances.
    #[error("calibration did not converge after {iterations} iterations (final cost {final_cost:.6e})")]
    DidNotConverge { iterations: usize, final_cost: f64 },

    /// The estimated geometry is degenerate (e.g. near-zero stereo baseline).
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Index-aligned sequences have mismatched lengths. Contract error;
    /// should not occur with correctly assembled data.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// A frame stream produced an unreadable frame. Ends accumulation for
    /// that stream; already-collected observations remain valid.
    #[error("frame source error: {0}")]
    FrameSource(String),
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, CalibError>;
