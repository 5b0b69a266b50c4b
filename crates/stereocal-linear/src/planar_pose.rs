//! Pose of a planar target from its homography.

use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};
use stereocal_core::{CalibError, Iso3, Mat3, Real, Result};

/// Decompose a plane-induced homography into the target pose `T_C_B`.
///
/// Assumes the target lies on the plane `z = 0` in its own coordinates, so
/// `H ~ K [r1 r2 t]`. The first two rotation columns are recovered from
/// `K^-1 H`, the third is their cross product, and the result is projected
/// onto SO(3) via polar decomposition.
pub fn pose_from_homography(kmtx: &Mat3, hmtx: &Mat3) -> Result<Iso3> {
    let k_inv = kmtx
        .try_inverse()
        .ok_or_else(|| CalibError::DegenerateGeometry("singular intrinsic matrix".into()))?;

    let h1 = hmtx.column(0);
    let h2 = hmtx.column(1);
    let h3 = hmtx.column(2).into_owned();

    let k_inv_h1 = k_inv * h1;
    let k_inv_h2 = k_inv * h2;

    // Scale: normalise the first two columns, average for robustness.
    let norm1 = k_inv_h1.norm();
    let norm2 = k_inv_h2.norm();
    if norm1 < Real::EPSILON || norm2 < Real::EPSILON {
        return Err(CalibError::DegenerateGeometry(
            "homography has a vanishing rotation column".into(),
        ));
    }
    let mut lambda = 1.0 / ((norm1 + norm2) * 0.5);

    // The target must be in front of the camera; flip the scale if the
    // decomposition put it behind.
    if (lambda * (k_inv * h3)).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = (lambda * k_inv_h1).into_owned();
    let r2 = (lambda * k_inv_h2).into_owned();
    let r3 = r1.cross(&r2);

    let mut r_mat = Matrix3::<Real>::zeros();
    r_mat.set_column(0, &r1);
    r_mat.set_column(1, &r2);
    r_mat.set_column(2, &r3);

    // Project onto SO(3).
    let svd = r_mat.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| CalibError::DegenerateGeometry("SVD failed in pose recovery".into()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::DegenerateGeometry("SVD failed in pose recovery".into()))?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let t_vec: Vector3<Real> = lambda * (k_inv * h3);
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Ok(Iso3::from_parts(Translation3::from(t_vec), rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stereocal_core::{rotation_angle_between, Intrinsics};

    #[test]
    fn recovers_a_synthetic_pose() {
        let kmtx = Intrinsics {
            fx: 800.0,
            fy: 780.0,
            cx: 640.0,
            cy: 360.0,
            skew: 0.0,
        }
        .k_matrix();

        let rot = Rotation3::from_euler_angles(0.1, -0.05, 0.2);
        let t = Vector3::new(0.1, -0.05, 1.0);

        let r_mat = rot.matrix();
        let mut hmtx = Mat3::zeros();
        hmtx.set_column(0, &(kmtx * r_mat.column(0)));
        hmtx.set_column(1, &(kmtx * r_mat.column(1)));
        hmtx.set_column(2, &(kmtx * t));

        let iso = pose_from_homography(&kmtx, &hmtx).unwrap();

        assert!((iso.translation.vector - t).norm() < 1e-6);
        let r_est = iso.rotation.to_rotation_matrix();
        let angle = rotation_angle_between(r_est.matrix(), r_mat);
        assert!(angle < 1e-6, "rotation error {angle}");
    }

    #[test]
    fn pose_stays_in_front_for_negated_homography() {
        // H is only defined up to scale; -H must give the same pose.
        let kmtx = Intrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
            skew: 0.0,
        }
        .k_matrix();

        let rot = Rotation3::from_euler_angles(0.05, 0.1, 0.0);
        let t = Vector3::new(0.0, 0.05, 1.5);
        let r_mat = rot.matrix();
        let mut hmtx = Mat3::zeros();
        hmtx.set_column(0, &(kmtx * r_mat.column(0)));
        hmtx.set_column(1, &(kmtx * r_mat.column(1)));
        hmtx.set_column(2, &(kmtx * t));

        let pose_pos = pose_from_homography(&kmtx, &hmtx).unwrap();
        let pose_neg = pose_from_homography(&kmtx, &(-hmtx)).unwrap();

        assert!(pose_pos.translation.vector.z > 0.0);
        assert!(pose_neg.translation.vector.z > 0.0);
        assert!((pose_pos.translation.vector - pose_neg.translation.vector).norm() < 1e-9);
    }
}
