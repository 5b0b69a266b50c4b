//! Derived epipolar matrices for a calibrated stereo pair.

use stereocal_core::{skew_symmetric, CalibError, Iso3, Mat3, Result};

/// Essential matrix `E = [T]x · R` from the relative pose `T_B_A`.
pub fn essential_from_pose(rel: &Iso3) -> Mat3 {
    let r = rel.rotation.to_rotation_matrix();
    skew_symmetric(&rel.translation.vector) * r.matrix()
}

/// Fundamental matrix `F = K_B^-T · E · K_A^-1`.
pub fn fundamental_from_essential(essential: &Mat3, k_a: &Mat3, k_b: &Mat3) -> Result<Mat3> {
    let k_a_inv = k_a
        .try_inverse()
        .ok_or_else(|| CalibError::DegenerateGeometry("singular K_A".into()))?;
    let k_b_inv = k_b
        .try_inverse()
        .ok_or_else(|| CalibError::DegenerateGeometry("singular K_B".into()))?;
    Ok(k_b_inv.transpose() * essential * k_a_inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, UnitQuaternion};
    use stereocal_core::{to_homogeneous, Intrinsics, Pt2, Pt3, Real, Vec3};

    fn project(k: &Mat3, p_c: &Pt3) -> Pt2 {
        let v = k * p_c.coords;
        Pt2::new(v.x / v.z, v.y / v.z)
    }

    #[test]
    fn epipolar_constraint_holds_for_synthetic_points() {
        let k_a = Intrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
            skew: 0.0,
        }
        .k_matrix();
        let k_b = Intrinsics {
            fx: 820.0,
            fy: 810.0,
            cx: 330.0,
            cy: 250.0,
            skew: 0.0,
        }
        .k_matrix();

        let rel = Iso3::from_parts(
            Translation3::new(0.1, 0.01, 0.0),
            UnitQuaternion::from_scaled_axis(Vec3::new(0.0, 0.05, 0.0)),
        );
        let e = essential_from_pose(&rel);
        let f = fundamental_from_essential(&e, &k_a, &k_b).unwrap();

        for i in 0..10 {
            let p_a = Pt3::new(
                -0.3 + 0.07 * i as Real,
                0.2 - 0.05 * i as Real,
                1.0 + 0.1 * i as Real,
            );
            let p_b = rel.transform_point(&p_a);

            let uv_a = project(&k_a, &p_a);
            let uv_b = project(&k_b, &p_b);

            let residual = to_homogeneous(&uv_b).dot(&(f * to_homogeneous(&uv_a)));
            assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn essential_is_rank_two() {
        let rel = Iso3::from_parts(
            Translation3::new(0.1, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        let e = essential_from_pose(&rel);
        let svd = e.svd(false, false);
        assert!(svd.singular_values[2].abs() < 1e-12);
        assert!(svd.singular_values[0] > 1e-6);
    }
}
