//! Run-level configuration for the calibration stages.

use serde::{Deserialize, Serialize};
use stereocal_core::{CalibError, Distortion, PatternGeometry, Real, Result};
use stereocal_optim::SolveOptions;

/// Checkerboard target description as supplied by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Interior-corner rows.
    pub rows: usize,
    /// Interior-corner columns.
    pub cols: usize,
    /// Physical spacing between adjacent corners, in the unit the
    /// translations should come out in.
    pub square_size: Real,
}

impl TargetConfig {
    /// Materialise the canonical object-point grid.
    pub fn pattern(&self) -> Result<PatternGeometry> {
        PatternGeometry::new(self.rows, self.cols, self.square_size)
    }
}

/// Nonlinear solver criteria, serializable counterpart of
/// [`stereocal_optim::SolveOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveConfig {
    pub max_iters: usize,
    pub ftol: Real,
    pub gtol: Real,
    pub xtol: Real,
}

impl Default for SolveConfig {
    fn default() -> Self {
        let d = SolveOptions::default();
        Self {
            max_iters: d.max_iters,
            ftol: d.ftol,
            gtol: d.gtol,
            xtol: d.xtol,
        }
    }
}

impl SolveConfig {
    pub(crate) fn options(&self) -> SolveOptions {
        SolveOptions {
            max_iters: self.max_iters,
            ftol: self.ftol,
            gtol: self.gtol,
            xtol: self.xtol,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iters == 0 {
            return Err(CalibError::InvalidConfiguration(
                "solver iteration cap must be >= 1".into(),
            ));
        }
        if !(self.ftol > 0.0 && self.gtol > 0.0 && self.xtol > 0.0) {
            return Err(CalibError::InvalidConfiguration(
                "solver tolerances must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration of one camera's intrinsic calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicConfig {
    /// Distortion variant to fit. Coefficients start from zero; the variant
    /// fixes how many the optimizer sees.
    pub distortion: Distortion,
    /// Below this view count the run proceeds with a warning. The hard
    /// floor of 3 views is not configurable.
    pub min_views: usize,
    pub solve: SolveConfig,
}

impl Default for IntrinsicConfig {
    fn default() -> Self {
        Self {
            distortion: Distortion::RadialTangential5 {
                k1: 0.0,
                k2: 0.0,
                p1: 0.0,
                p2: 0.0,
                k3: 0.0,
            },
            min_views: 10,
            solve: SolveConfig::default(),
        }
    }
}

impl IntrinsicConfig {
    pub fn validate(&self) -> Result<()> {
        self.solve.validate()
    }
}

/// Configuration of the stereo extrinsic calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereoConfig {
    /// Minimum number of synchronized views. Fewer is an
    /// `InsufficientCorrespondences` error.
    pub min_views: usize,
    pub solve: SolveConfig,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            min_views: 8,
            solve: SolveConfig::default(),
        }
    }
}

impl StereoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_views == 0 {
            return Err(CalibError::InvalidConfiguration(
                "stereo calibration needs a positive minimum view count".into(),
            ));
        }
        self.solve.validate()
    }
}

/// Framing choice for rectification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectifyConfig {
    /// In [0, 1]: 0 zooms so only valid pixels remain, 1 zooms out so no
    /// source pixel is lost.
    pub alpha: Real,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self { alpha: 0.0 }
    }
}

impl RectifyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(CalibError::InvalidConfiguration(format!(
                "rectification alpha must be in [0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}
