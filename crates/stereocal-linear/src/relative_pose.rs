//! Relative-pose candidates and SE(3) averaging for stereo initialisation.

use nalgebra::{Quaternion, Translation3, UnitQuaternion};
use stereocal_core::{CalibError, Iso3, Real, Result, Vec3};

/// Per-view candidate for the transform mapping camera-A coordinates into
/// camera-B coordinates.
///
/// With `pose_a = T_A_target` and `pose_b = T_B_target` observed in the same
/// frame, the candidate is `T_B_A = pose_b * pose_a^-1`.
pub fn relative_pose_candidate(pose_a: &Iso3, pose_b: &Iso3) -> Iso3 {
    pose_b * pose_a.inverse()
}

/// Simple SE(3) averaging:
/// - translations are averaged arithmetically,
/// - rotations are averaged in quaternion space with hemisphere correction.
///
/// Use this only for initialisation; the joint refinement downstream is what
/// produces the final estimate.
pub fn average_isometries(poses: &[Iso3]) -> Result<Iso3> {
    if poses.is_empty() {
        return Err(CalibError::InsufficientCorrespondences { got: 0, need: 1 });
    }

    let mut t_sum = Vec3::zeros();
    for iso in poses {
        t_sum += iso.translation.vector;
    }
    let t_avg = Translation3::from(t_sum / poses.len() as Real);

    // Reference hemisphere to avoid quaternion sign cancellation.
    let q0 = poses[0].rotation;
    let mut acc = nalgebra::Vector4::<Real>::zeros();
    for iso in poses {
        let coords = iso.rotation.coords;
        let sign = if q0.coords.dot(&coords) < 0.0 { -1.0 } else { 1.0 };
        acc += coords * sign;
    }

    if acc.norm_squared() == 0.0 {
        return Ok(Iso3::from_parts(t_avg, UnitQuaternion::identity()));
    }

    let q = Quaternion::from_vector(acc / poses.len() as Real).normalize();
    Ok(Iso3::from_parts(t_avg, UnitQuaternion::from_quaternion(q)))
}
