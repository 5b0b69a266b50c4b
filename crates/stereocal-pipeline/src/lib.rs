//! End-to-end calibration stages.
//!
//! The pipeline turns accumulated observations into persisted models:
//!
//! 1. [`calibrate_intrinsics`] fits one camera's model from its
//!    [`stereocal_core::ObservationSet`].
//! 2. [`calibrate_stereo`] fits the relative pose between two calibrated
//!    cameras from a [`stereocal_core::SynchronizedObservationPair`].
//! 3. [`stereo_rectify`] derives the row-aligning transforms from the
//!    stereo result.
//!
//! Each stage validates its inputs, reports reprojection quality, and
//! produces an immutable, JSON-serializable artifact.

mod artifacts;
mod config;
mod intrinsics;
mod rectify;
mod stereo;
mod validate;

pub use artifacts::*;
pub use config::*;
pub use intrinsics::*;
pub use rectify::*;
pub use stereo::*;
pub use validate::*;
