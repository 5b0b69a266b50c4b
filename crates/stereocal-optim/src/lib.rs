//! Nonlinear least-squares refinement for calibration problems.
//!
//! The crate exposes a dense [`NllsProblem`] trait, a Levenberg–Marquardt
//! backend, and the two concrete problems the pipeline solves: joint
//! intrinsics + per-view poses, and stereo extrinsics with fixed intrinsics.

mod intrinsics;
mod solver;
mod stereo;

pub use intrinsics::*;
pub use solver::*;
pub use stereo::*;
