//! Iterative sub-pixel corner refinement.

use image::GrayImage;
use stereocal_core::{CalibError, Pt2, Real, Result};

/// Termination criteria for sub-pixel refinement.
///
/// Refinement of one corner stops after `max_iterations` or once the
/// positional change of an iteration drops below `epsilon` pixels.
#[derive(Debug, Clone, Copy)]
pub struct RefineConfig {
    /// Half-width of the square search window around the corner.
    pub window_radius: usize,
    /// Iteration cap per corner.
    pub max_iterations: usize,
    /// Convergence threshold on the per-iteration shift, in pixels.
    pub epsilon: Real,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            window_radius: 5,
            max_iterations: 30,
            epsilon: 0.001,
        }
    }
}

impl RefineConfig {
    /// Reject configurations the refinement loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_radius == 0 {
            return Err(CalibError::InvalidConfiguration(
                "refinement window radius must be >= 1".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(CalibError::InvalidConfiguration(
                "refinement iteration cap must be >= 1".into(),
            ));
        }
        if !(self.epsilon > 0.0) {
            return Err(CalibError::InvalidConfiguration(format!(
                "refinement epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Refine integer corner estimates to sub-pixel accuracy in place.
///
/// Each corner is pulled towards the gradient-magnitude-weighted centroid of
/// its local window; at a checkerboard X-junction that centroid coincides
/// with the saddle point.
pub fn refine_corners(image: &GrayImage, corners: &mut [Pt2], config: &RefineConfig) {
    let w = image.width() as i32;
    let h = image.height() as i32;
    let radius = config.window_radius as i32;

    for p in corners.iter_mut() {
        let mut x = p.x;
        let mut y = p.y;

        for _ in 0..config.max_iterations {
            let cx = x.round() as i32;
            let cy = y.round() as i32;

            let mut sw = 0.0_f64;
            let mut sx = 0.0_f64;
            let mut sy = 0.0_f64;

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let xx = cx + dx;
                    let yy = cy + dy;
                    if xx <= 0 || yy <= 0 || xx >= w - 1 || yy >= h - 1 {
                        continue;
                    }
                    let gx = (image.get_pixel((xx + 1) as u32, yy as u32)[0] as Real
                        - image.get_pixel((xx - 1) as u32, yy as u32)[0] as Real)
                        * 0.5;
                    let gy = (image.get_pixel(xx as u32, (yy + 1) as u32)[0] as Real
                        - image.get_pixel(xx as u32, (yy - 1) as u32)[0] as Real)
                        * 0.5;
                    let weight = (gx * gx + gy * gy).sqrt();
                    if weight <= 1e-9 {
                        continue;
                    }
                    sw += weight;
                    sx += weight * xx as Real;
                    sy += weight * yy as Real;
                }
            }

            if sw <= 1e-9 {
                break;
            }

            let nx = sx / sw;
            let ny = sy / sw;
            let shift = ((nx - x).powi(2) + (ny - y).powi(2)).sqrt();
            x = nx;
            y = ny;
            if shift < config.epsilon {
                break;
            }
        }

        p.x = x.clamp(0.0, (image.width() - 1) as Real);
        p.y = y.clamp(0.0, (image.height() - 1) as Real);
    }
}
