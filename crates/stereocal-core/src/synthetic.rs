//! Synthetic planar-scene helpers.
//!
//! These functions render a checkerboard through a known camera model to
//! produce [`Observation`]s with known ground truth. They are the primary
//! correctness oracle for the calibration solvers, since no external ground
//! truth exists for production footage.

use nalgebra::{Translation3, UnitQuaternion};

use crate::{
    CameraModel, Iso3, Observation, PatternGeometry, Real, Result, Vec2, Vec3,
};

/// Generate `n_views` target poses with a yaw/pitch sweep and a Z ramp.
///
/// Keeps the board in front of the camera while varying viewpoint enough for
/// Zhang's method to be well conditioned.
pub fn sweep_poses(n_views: usize, z_start: Real, z_step: Real) -> Vec<Iso3> {
    (0..n_views)
        .map(|i| {
            let yaw = -0.3 + 0.05 * i as Real;
            let pitch = 0.2 - 0.04 * i as Real;
            let rotation = UnitQuaternion::from_scaled_axis(Vec3::new(0.0, 1.0, 0.0) * yaw)
                * UnitQuaternion::from_scaled_axis(Vec3::new(1.0, 0.0, 0.0) * pitch);
            let translation = Vec3::new(
                -0.1 + 0.01 * i as Real,
                -0.05 + 0.008 * i as Real,
                z_start + z_step * i as Real,
            );
            Iso3::from_parts(Translation3::from(translation), rotation)
        })
        .collect()
}

/// Project the target through `camera` at `cam_from_target`, producing a full
/// observation.
///
/// Fails if any point lands behind the camera; synthetic poses should keep
/// the whole board visible.
pub fn project_pattern(
    camera: &CameraModel,
    cam_from_target: &Iso3,
    pattern: &PatternGeometry,
) -> Result<Observation> {
    let mut image_points = Vec::with_capacity(pattern.num_points());
    for pw in pattern.object_points() {
        let p_c = cam_from_target.transform_point(pw);
        if p_c.z <= 0.0 {
            return Err(crate::CalibError::DegenerateGeometry(format!(
                "synthetic point behind the camera (z = {:.4})",
                p_c.z
            )));
        }
        image_points.push(camera.project(&p_c));
    }
    let image_points = image_points
        .into_iter()
        .map(|uv| crate::Pt2::new(uv.x, uv.y))
        .collect();
    Observation::new(pattern.object_points().to_vec(), image_points)
}

/// Deterministic zero-mean pixel noise.
///
/// Uses a splitmix64 hash of `(seed, view, point)` so synthetic datasets are
/// stable across platforms and do not depend on an RNG crate's stream
/// internals. `sigma_px` scales an approximately normal sample obtained by
/// summing uniform draws.
#[derive(Debug, Clone, Copy)]
pub struct PixelNoise {
    pub seed: u64,
    pub sigma_px: Real,
}

impl PixelNoise {
    /// Sample the noise vector for a `(view, point)` key.
    pub fn sample(&self, view_idx: usize, point_idx: usize) -> Vec2 {
        if self.sigma_px == 0.0 {
            return Vec2::zeros();
        }
        let key = self.seed
            ^ (view_idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (point_idx as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);

        // Irwin-Hall approximation: sum of 12 uniforms minus 6 is close to
        // a standard normal.
        let mut du = 0.0;
        let mut dv = 0.0;
        for i in 0..12u64 {
            du += unit_f64(splitmix64(key.wrapping_add(i)));
            dv += unit_f64(splitmix64(key.wrapping_add(i) ^ 0x94D0_49BB_1331_11EB));
        }
        Vec2::new((du - 6.0) * self.sigma_px, (dv - 6.0) * self.sigma_px)
    }

    /// Apply noise to every image point of an observation.
    pub fn perturb(&self, view_idx: usize, observation: &mut Observation) {
        for (point_idx, p) in observation.image_points.iter_mut().enumerate() {
            let n = self.sample(view_idx, point_idx);
            p.x += n.x;
            p.y += n.y;
        }
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn unit_f64(x: u64) -> Real {
    // Top 53 bits to a double in [0, 1).
    ((x >> 11) as Real) * (1.0 / ((1u64 << 53) as Real))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Distortion, Intrinsics};

    fn camera() -> CameraModel {
        CameraModel {
            intrinsics: Intrinsics {
                fx: 800.0,
                fy: 800.0,
                cx: 320.0,
                cy: 240.0,
                skew: 0.0,
            },
            distortion: Distortion::None,
        }
    }

    #[test]
    fn projected_pattern_is_full_length() {
        let pat = PatternGeometry::new(4, 5, 0.03).unwrap();
        let pose = sweep_poses(1, 0.8, 0.0)[0];
        let obs = project_pattern(&camera(), &pose, &pat).unwrap();
        assert_eq!(obs.len(), pat.num_points());
    }

    #[test]
    fn noise_is_deterministic_and_zero_for_zero_sigma() {
        let noise = PixelNoise {
            seed: 7,
            sigma_px: 0.1,
        };
        assert_eq!(noise.sample(3, 11), noise.sample(3, 11));
        assert_ne!(noise.sample(3, 11), noise.sample(3, 12));

        let silent = PixelNoise {
            seed: 7,
            sigma_px: 0.0,
        };
        assert_eq!(silent.sample(0, 0), Vec2::zeros());
    }

    #[test]
    fn noise_magnitude_tracks_sigma() {
        let noise = PixelNoise {
            seed: 42,
            sigma_px: 0.1,
        };
        let mut sum_sq = 0.0;
        let n = 500;
        for i in 0..n {
            let s = noise.sample(0, i);
            sum_sq += s.norm_squared();
        }
        // Two axes, each with variance sigma^2.
        let rms = (sum_sq / n as Real).sqrt();
        assert!(rms > 0.08 && rms < 0.2, "rms = {rms}");
    }
}
