//! Core types for `stereocal-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, ...),
//! - the pinhole camera model with configurable distortion,
//! - observation types accumulated from checkerboard detections,
//! - the checkerboard pattern geometry,
//! - the error taxonomy shared across the workspace,
//! - deterministic synthetic-scene helpers used by the test suites.

/// Camera model: intrinsics, distortion and projection.
pub mod camera;
/// Error taxonomy for the calibration pipeline.
pub mod error;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Observation types for calibration data.
pub mod observation;
/// Checkerboard pattern geometry.
pub mod pattern;
/// Synthetic planar-scene helpers for tests.
pub mod synthetic;

pub use camera::*;
pub use error::*;
pub use math::*;
pub use observation::*;
pub use pattern::*;
