//! Stereo extrinsic calibration with fixed intrinsics.
//!
//! Each retained synchronized view yields the target's pose w.r.t. both
//! cameras (undistorted points, homography decomposition), and so one
//! candidate for the camera-A-to-camera-B transform. Averaging the
//! candidates seeds a joint LM solve over the shared relative pose and the
//! per-view target poses; the camera models themselves stay fixed.

use nalgebra::Rotation3;
use serde::{Deserialize, Serialize};
use stereocal_core::{
    CalibError, CameraModel, Iso3, Mat3, Observation, Pt2, ReprojectionStats,
    Result, SynchronizedObservationPair, Vec3,
};
use stereocal_linear::{
    average_isometries, dlt_homography, essential_from_pose,
    fundamental_from_essential, pose_from_homography, relative_pose_candidate,
};
use stereocal_optim::{pack_stereo_params, LmBackend, StereoExtrinsicsProblem};

use crate::intrinsics::planar_world_points;
use crate::{stereo_reprojection_report, CalibrationReport, StereoConfig};

/// Persisted stereo calibration artifact.
///
/// `rotation` and `translation` map camera-A coordinates into camera B:
/// `x_b = R x_a + T`. The essential and fundamental matrices are derived at
/// construction and kept with the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtrinsicModel {
    pub rotation: Mat3,
    pub translation: Vec3,
    pub essential: Mat3,
    pub fundamental: Mat3,
    /// Reprojection quality over both cameras at the accepted solution.
    pub reprojection: ReprojectionStats,
}

impl ExtrinsicModel {
    /// Build the artifact from a relative pose, deriving E and F from the
    /// pose and the two calibration matrices.
    pub fn from_pose(
        rel: &Iso3,
        camera_a: &CameraModel,
        camera_b: &CameraModel,
        reprojection: ReprojectionStats,
    ) -> Result<Self> {
        let essential = essential_from_pose(rel);
        let fundamental = fundamental_from_essential(
            &essential,
            &camera_a.intrinsics.k_matrix(),
            &camera_b.intrinsics.k_matrix(),
        )?;
        Ok(Self {
            rotation: *rel.rotation.to_rotation_matrix().matrix(),
            translation: rel.translation.vector,
            essential,
            fundamental,
            reprojection,
        })
    }

    /// The relative pose as a rigid transform.
    pub fn relative_pose(&self) -> Iso3 {
        Iso3::from_parts(
            self.translation.into(),
            Rotation3::from_matrix_unchecked(self.rotation).into(),
        )
    }

    /// Baseline length in the translation's unit.
    pub fn baseline(&self) -> f64 {
        self.translation.norm()
    }
}

/// Full result of a stereo calibration run.
#[derive(Debug, Clone)]
pub struct StereoCalibration {
    pub model: ExtrinsicModel,
    /// Target-to-camera-A pose of each retained view.
    pub poses_a: Vec<Iso3>,
    pub report: CalibrationReport,
}

/// Planar pose of the target w.r.t. one camera, from undistorted pixels.
fn view_pose(camera: &CameraModel, view: &Observation) -> Result<Iso3> {
    let undistorted = view
        .image_points
        .iter()
        .map(|p| {
            camera
                .undistort_pixel(&stereocal_core::Vec2::new(p.x, p.y))
                .map(|uv| Pt2::new(uv.x, uv.y))
                .ok_or_else(|| {
                    CalibError::DegenerateGeometry(
                        "singular calibration matrix".into(),
                    )
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let h = dlt_homography(&planar_world_points(view), &undistorted)?;
    pose_from_homography(&camera.intrinsics.k_matrix(), &h)
}

/// Calibrate the relative pose between two already-calibrated cameras.
///
/// Fewer than `config.min_views` synchronized views is an error; a solver
/// stop without convergence is [`CalibError::DidNotConverge`].
pub fn calibrate_stereo(
    pair: &SynchronizedObservationPair,
    camera_a: &CameraModel,
    camera_b: &CameraModel,
    config: &StereoConfig,
) -> Result<StereoCalibration> {
    config.validate()?;

    if pair.len() < config.min_views {
        return Err(CalibError::InsufficientCorrespondences {
            got: pair.len(),
            need: config.min_views,
        });
    }

    let mut poses_a = Vec::with_capacity(pair.len());
    let mut candidates = Vec::with_capacity(pair.len());
    for (view_a, view_b) in pair.views_a().iter().zip(pair.views_b().iter()) {
        let pose_a = view_pose(camera_a, view_a)?;
        let pose_b = view_pose(camera_b, view_b)?;
        candidates.push(relative_pose_candidate(&pose_a, &pose_b));
        poses_a.push(pose_a);
    }
    let rel_init = average_isometries(&candidates)?;

    let problem = StereoExtrinsicsProblem::new(
        *camera_a,
        *camera_b,
        pair.views_a().to_vec(),
        pair.views_b().to_vec(),
    );
    let x0 = pack_stereo_params(&rel_init, &poses_a);
    let (x_opt, solve) = LmBackend.solve(&problem, x0, &config.solve.options());
    if !solve.converged {
        return Err(CalibError::DidNotConverge {
            iterations: solve.iterations,
            final_cost: solve.final_cost,
        });
    }

    let (rel, poses_a) = problem.decode(&x_opt);
    let report = stereo_reprojection_report(
        camera_a,
        camera_b,
        &rel,
        &poses_a,
        pair.views_a(),
        pair.views_b(),
    )?;
    log::debug!(
        "stereo calibration: {} views, baseline {:.4}, mean error {:.4} px",
        pair.len(),
        rel.translation.vector.norm(),
        report.mean_error()
    );

    let model = ExtrinsicModel::from_pose(&rel, camera_a, camera_b, report.overall)?;

    Ok(StereoCalibration {
        model,
        poses_a,
        report,
    })
}
