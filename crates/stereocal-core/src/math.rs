//! Mathematical type definitions and small helpers.

use nalgebra::{Isometry3, Matrix3, Matrix3x4, Matrix4, Point2, Point3, Vector2, Vector3};

/// Scalar type used throughout the workspace (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3×4 projection matrix with [`Real`] entries.
pub type Mat34 = Matrix3x4<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Convert a 2D point into homogeneous coordinates `(x, y, 1)`.
pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Convert a homogeneous vector `(x, y, w)` back to `(x / w, y / w)`.
///
/// The caller is responsible for ensuring that `w != 0`.
pub fn from_homogeneous(v: &Vec3) -> Pt2 {
    Pt2::new(v.x / v.z, v.y / v.z)
}

/// Skew-symmetric cross-product matrix `[v]x` such that `[v]x · w = v × w`.
pub fn skew_symmetric(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Angle (radians) between two rotation matrices, from the trace of `Ra^T Rb`.
pub fn rotation_angle_between(ra: &Mat3, rb: &Mat3) -> Real {
    let r_diff = ra.transpose() * rb;
    ((r_diff.trace() - 1.0) * 0.5).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn skew_matches_cross_product() {
        let v = Vec3::new(1.0, -2.0, 0.5);
        let w = Vec3::new(0.3, 0.7, -1.1);
        let lhs = skew_symmetric(&v) * w;
        let rhs = v.cross(&w);
        assert!((lhs - rhs).norm() < 1e-14);
    }

    #[test]
    fn homogeneous_round_trip() {
        let p = Pt2::new(3.0, -4.0);
        let h = to_homogeneous(&p);
        assert_eq!(from_homogeneous(&h), p);
    }

    #[test]
    fn rotation_angle_of_identity_is_zero() {
        let r = Mat3::identity();
        assert_abs_diff_eq!(rotation_angle_between(&r, &r), 0.0, epsilon = 1e-12);
    }
}
