//! Pinhole camera model with configurable radial–tangential distortion.

use serde::{Deserialize, Serialize};

use crate::{Mat3, Pt3, Real, Vec2, Vec3};

/// Pinhole intrinsics with optional skew.
///
/// The corresponding calibration matrix `K` has the form:
///
/// ```text
/// [ fx  skew  cx ]
/// [  0   fy   cy ]
/// [  0    0    1 ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
    pub skew: Real,
}

impl Intrinsics {
    /// Build the 3×3 calibration matrix `K`.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, self.skew, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    /// Construct intrinsics from a 3×3 calibration matrix.
    ///
    /// The matrix is normalised so that `K[2, 2] == 1` and checked against
    /// the standard upper-triangular form. Returns `None` if the structure
    /// does not match within a small tolerance.
    pub fn try_from_k_matrix(k: &Mat3) -> Option<Self> {
        let eps = 1e-9;
        let k33 = k[(2, 2)];
        if k33.abs() < eps {
            return None;
        }
        let k_norm = k / k33;

        if k_norm[(1, 0)].abs() > eps || k_norm[(2, 0)].abs() > eps || k_norm[(2, 1)].abs() > eps {
            return None;
        }

        Some(Self {
            fx: k_norm[(0, 0)],
            skew: k_norm[(0, 1)],
            cx: k_norm[(0, 2)],
            fy: k_norm[(1, 1)],
            cy: k_norm[(1, 2)],
        })
    }
}

/// Lens distortion applied in normalised image coordinates.
///
/// The variant is a configuration choice: it fixes how many coefficients the
/// intrinsic optimizer fits (0, 5 or 8).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Distortion {
    /// Ideal lens, no distortion parameters.
    None,
    /// Brown–Conrady radial (k1..k3) + tangential (p1, p2) model.
    RadialTangential5 {
        k1: Real,
        k2: Real,
        p1: Real,
        p2: Real,
        k3: Real,
    },
    /// Rational model: radial numerator (k1..k3) and denominator (k4..k6)
    /// plus tangential (p1, p2).
    RadialTangential8 {
        k1: Real,
        k2: Real,
        p1: Real,
        p2: Real,
        k3: Real,
        k4: Real,
        k5: Real,
        k6: Real,
    },
}

impl Distortion {
    /// Number of free coefficients this variant contributes to the
    /// optimizer's parameter vector.
    pub fn num_coefficients(&self) -> usize {
        match self {
            Distortion::None => 0,
            Distortion::RadialTangential5 { .. } => 5,
            Distortion::RadialTangential8 { .. } => 8,
        }
    }

    /// Coefficients in packing order `(k1, k2, p1, p2, k3[, k4, k5, k6])`.
    pub fn coefficients(&self) -> Vec<Real> {
        match *self {
            Distortion::None => Vec::new(),
            Distortion::RadialTangential5 { k1, k2, p1, p2, k3 } => vec![k1, k2, p1, p2, k3],
            Distortion::RadialTangential8 {
                k1,
                k2,
                p1,
                p2,
                k3,
                k4,
                k5,
                k6,
            } => vec![k1, k2, p1, p2, k3, k4, k5, k6],
        }
    }

    /// Rebuild the same variant from a coefficient slice in packing order.
    ///
    /// Panics if `coeffs.len()` does not match the variant; the optimizer
    /// owns the packing and guarantees the length.
    pub fn from_coefficients(template: &Distortion, coeffs: &[Real]) -> Self {
        match template {
            Distortion::None => {
                assert!(coeffs.is_empty(), "no coefficients expected");
                Distortion::None
            }
            Distortion::RadialTangential5 { .. } => {
                assert_eq!(coeffs.len(), 5, "expected 5 distortion coefficients");
                Distortion::RadialTangential5 {
                    k1: coeffs[0],
                    k2: coeffs[1],
                    p1: coeffs[2],
                    p2: coeffs[3],
                    k3: coeffs[4],
                }
            }
            Distortion::RadialTangential8 { .. } => {
                assert_eq!(coeffs.len(), 8, "expected 8 distortion coefficients");
                Distortion::RadialTangential8 {
                    k1: coeffs[0],
                    k2: coeffs[1],
                    p1: coeffs[2],
                    p2: coeffs[3],
                    k3: coeffs[4],
                    k4: coeffs[5],
                    k5: coeffs[6],
                    k6: coeffs[7],
                }
            }
        }
    }

    /// Zero-valued distortion of the same variant.
    pub fn zeroed(&self) -> Self {
        let coeffs = vec![0.0; self.num_coefficients()];
        Self::from_coefficients(self, &coeffs)
    }

    /// Apply distortion to normalised coordinates.
    pub fn distort(&self, x: Real, y: Real) -> (Real, Real) {
        match *self {
            Distortion::None => (x, y),
            Distortion::RadialTangential5 { k1, k2, p1, p2, k3 } => {
                let r2 = x * x + y * y;
                let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
                let x_t = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
                let y_t = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
                (x * radial + x_t, y * radial + y_t)
            }
            Distortion::RadialTangential8 {
                k1,
                k2,
                p1,
                p2,
                k3,
                k4,
                k5,
                k6,
            } => {
                let r2 = x * x + y * y;
                let r4 = r2 * r2;
                let r6 = r4 * r2;
                let radial = (1.0 + k1 * r2 + k2 * r4 + k3 * r6) / (1.0 + k4 * r2 + k5 * r4 + k6 * r6);
                let x_t = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
                let y_t = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
                (x * radial + x_t, y * radial + y_t)
            }
        }
    }

    /// Invert the distortion by fixed-point iteration.
    pub fn undistort(&self, x_d: Real, y_d: Real) -> (Real, Real) {
        if matches!(self, Distortion::None) {
            return (x_d, y_d);
        }
        let mut x = x_d;
        let mut y = y_d;
        for _ in 0..10 {
            let (xd, yd) = self.distort(x, y);
            x -= xd - x_d;
            y -= yd - y_d;
        }
        (x, y)
    }
}

/// Pinhole camera: calibration matrix plus lens distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
}

impl CameraModel {
    /// Project a 3D point in camera coordinates to distorted pixel
    /// coordinates.
    ///
    /// The `z` component of `p_c` must be non-zero.
    pub fn project(&self, p_c: &Pt3) -> Vec2 {
        let x = p_c.x / p_c.z;
        let y = p_c.y / p_c.z;
        let (x_d, y_d) = self.distortion.distort(x, y);

        let k = &self.intrinsics;
        let u = k.fx * x_d + k.skew * y_d + k.cx;
        let v = k.fy * y_d + k.cy;
        Vec2::new(u, v)
    }

    /// Map a measured, distorted pixel to normalised (z = 1) coordinates
    /// with distortion removed.
    ///
    /// Returns `None` if the calibration matrix is singular.
    pub fn pixel_to_normalized(&self, uv: &Vec2) -> Option<Vec2> {
        let k_inv = self.intrinsics.k_matrix().try_inverse()?;
        let p_n = k_inv * Vec3::new(uv.x, uv.y, 1.0);
        let (x, y) = self
            .distortion
            .undistort(p_n.x / p_n.z, p_n.y / p_n.z);
        Some(Vec2::new(x, y))
    }

    /// Map a distorted pixel to the ideal pixel the same `K` would produce
    /// with a perfect lens.
    pub fn undistort_pixel(&self, uv: &Vec2) -> Option<Vec2> {
        let n = self.pixel_to_normalized(uv)?;
        let p = self.intrinsics.k_matrix() * Vec3::new(n.x, n.y, 1.0);
        Some(Vec2::new(p.x / p.z, p.y / p.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera(distortion: Distortion) -> CameraModel {
        CameraModel {
            intrinsics: Intrinsics {
                fx: 800.0,
                fy: 780.0,
                cx: 640.0,
                cy: 360.0,
                skew: 0.0,
            },
            distortion,
        }
    }

    #[test]
    fn k_matrix_round_trip() {
        let intr = test_camera(Distortion::None).intrinsics;
        let k = intr.k_matrix();
        let restored = Intrinsics::try_from_k_matrix(&k).unwrap();
        assert_eq!(restored, intr);
    }

    #[test]
    fn try_from_rejects_non_upper_triangular() {
        let mut k = test_camera(Distortion::None).intrinsics.k_matrix();
        k[(2, 0)] = 0.5;
        assert!(Intrinsics::try_from_k_matrix(&k).is_none());
    }

    #[test]
    fn project_without_distortion_is_linear() {
        let cam = test_camera(Distortion::None);
        let uv = cam.project(&Pt3::new(0.1, -0.05, 1.0));
        assert!((uv.x - (800.0 * 0.1 + 640.0)).abs() < 1e-12);
        assert!((uv.y - (780.0 * -0.05 + 360.0)).abs() < 1e-12);
    }

    #[test]
    fn undistort_inverts_distort_rt5() {
        let dist = Distortion::RadialTangential5 {
            k1: -0.12,
            k2: 0.02,
            p1: 0.001,
            p2: -0.0015,
            k3: 0.0,
        };
        let (xd, yd) = dist.distort(0.2, -0.15);
        let (x, y) = dist.undistort(xd, yd);
        assert!((x - 0.2).abs() < 1e-8);
        assert!((y + 0.15).abs() < 1e-8);
    }

    #[test]
    fn undistort_inverts_distort_rt8() {
        let dist = Distortion::RadialTangential8 {
            k1: 0.1,
            k2: -0.01,
            p1: 0.0005,
            p2: 0.0,
            k3: 0.0,
            k4: 0.05,
            k5: 0.0,
            k6: 0.0,
        };
        let (xd, yd) = dist.distort(-0.1, 0.25);
        let (x, y) = dist.undistort(xd, yd);
        assert!((x + 0.1).abs() < 1e-8);
        assert!((y - 0.25).abs() < 1e-8);
    }

    #[test]
    fn coefficient_packing_round_trips() {
        let dist = Distortion::RadialTangential5 {
            k1: 1.0,
            k2: 2.0,
            p1: 3.0,
            p2: 4.0,
            k3: 5.0,
        };
        let coeffs = dist.coefficients();
        assert_eq!(coeffs, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(Distortion::from_coefficients(&dist, &coeffs), dist);
    }

    #[test]
    fn pixel_to_normalized_recovers_projection_input() {
        let cam = test_camera(Distortion::RadialTangential5 {
            k1: -0.1,
            k2: 0.01,
            p1: 0.001,
            p2: -0.001,
            k3: 0.0,
        });
        let p = Pt3::new(0.15, 0.1, 2.0);
        let uv = cam.project(&p);
        let n = cam.pixel_to_normalized(&uv).unwrap();
        assert!((n.x - p.x / p.z).abs() < 1e-8);
        assert!((n.y - p.y / p.z).abs() < 1e-8);
    }
}
