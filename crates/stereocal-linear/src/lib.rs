//! Closed-form building blocks for calibration initialisation.
//!
//! Everything here is direct linear algebra: plane homographies, Zhang's
//! intrinsic initialisation, homography-to-pose decomposition, relative-pose
//! averaging and the derived epipolar matrices. Nonlinear refinement lives
//! in `stereocal-optim`.

mod epipolar;
mod homography;
mod planar_pose;
mod relative_pose;
mod zhang;

pub use epipolar::*;
pub use homography::*;
pub use planar_pose::*;
pub use relative_pose::*;
pub use zhang::*;
