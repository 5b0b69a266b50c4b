//! Single-camera intrinsic calibration.
//!
//! Zhang's method provides the closed-form start: per-view DLT homographies
//! constrain the image of the absolute conic, giving K; decomposing each
//! homography against K gives the per-view planar poses. A joint LM solve
//! then refines intrinsics, distortion coefficients and all poses over the
//! stacked reprojection residuals.

use serde::{Deserialize, Serialize};
use stereocal_core::{
    CalibError, CameraModel, Iso3, Observation, ObservationSet, Pt2,
    ReprojectionStats, Result,
};
use stereocal_linear::{
    dlt_homography, intrinsics_from_homographies, pose_from_homography,
};
use stereocal_optim::{pack_intrinsics_params, IntrinsicsProblem, LmBackend};

use crate::{reprojection_report, CalibrationReport, IntrinsicConfig};

/// Hard floor on views for Zhang's method.
const MIN_VIEWS_HARD: usize = 3;

/// Persisted per-camera calibration artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrinsicModel {
    pub camera: CameraModel,
    /// Reprojection quality at the accepted solution.
    pub reprojection: ReprojectionStats,
}

/// Full result of an intrinsic calibration run.
///
/// Per-view poses are a by-product of the joint solve; they are reported for
/// diagnostics and stereo initialisation but not persisted with the model.
#[derive(Debug, Clone)]
pub struct IntrinsicCalibration {
    pub model: IntrinsicModel,
    /// Target-to-camera pose of each view, in observation order.
    pub poses: Vec<Iso3>,
    pub report: CalibrationReport,
}

/// Target-plane coordinates of an observation, for homography estimation.
pub(crate) fn planar_world_points(view: &Observation) -> Vec<Pt2> {
    view.object_points
        .iter()
        .map(|p| Pt2::new(p.x, p.y))
        .collect()
}

/// Calibrate one camera from its accumulated observations.
///
/// Fewer than 3 views is an error; fewer than `config.min_views` proceeds
/// with a warning. A solver stop without convergence is reported as
/// [`CalibError::DidNotConverge`], distinct from insufficient data.
pub fn calibrate_intrinsics(
    observations: &ObservationSet,
    config: &IntrinsicConfig,
) -> Result<IntrinsicCalibration> {
    config.validate()?;

    let views = observations.observations();
    if views.len() < MIN_VIEWS_HARD {
        return Err(CalibError::InsufficientCorrespondences {
            got: views.len(),
            need: MIN_VIEWS_HARD,
        });
    }
    if views.len() < config.min_views {
        log::warn!(
            "calibrating from {} views, below the recommended minimum of {}",
            views.len(),
            config.min_views
        );
    }

    let homographies = views
        .iter()
        .map(|view| dlt_homography(&planar_world_points(view), &view.image_points))
        .collect::<Result<Vec<_>>>()?;

    let intrinsics = intrinsics_from_homographies(&homographies)?;
    let kmtx = intrinsics.k_matrix();
    let poses_init = homographies
        .iter()
        .map(|h| pose_from_homography(&kmtx, h))
        .collect::<Result<Vec<_>>>()?;

    let camera_init = CameraModel {
        intrinsics,
        distortion: config.distortion.zeroed(),
    };

    let problem = IntrinsicsProblem::new(views.to_vec(), camera_init.distortion);
    let x0 = pack_intrinsics_params(&camera_init, &poses_init);
    let (x_opt, solve) = LmBackend.solve(&problem, x0, &config.solve.options());
    if !solve.converged {
        return Err(CalibError::DidNotConverge {
            iterations: solve.iterations,
            final_cost: solve.final_cost,
        });
    }

    let (camera, poses) = problem.decode(&x_opt);
    let report = reprojection_report(&camera, &poses, views)?;
    log::debug!(
        "intrinsic calibration: {} views, mean error {:.4} px",
        views.len(),
        report.mean_error()
    );

    Ok(IntrinsicCalibration {
        model: IntrinsicModel {
            camera,
            reprojection: report.overall,
        },
        poses,
        report,
    })
}
