//! Reprojection-error validation.

use serde::{Deserialize, Serialize};
use stereocal_core::{
    CalibError, CameraModel, Iso3, Observation, Real, ReprojectionStats, Result,
};

/// Per-view and overall reprojection quality of a calibration run.
///
/// Acceptance thresholds are caller policy; this type only reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// One entry per view, in view order.
    pub per_view: Vec<ReprojectionStats>,
    /// Statistics over all points of all views.
    pub overall: ReprojectionStats,
}

impl CalibrationReport {
    /// Mean reprojection error over all points, in pixels.
    pub fn mean_error(&self) -> Real {
        self.overall.mean
    }
}

/// Euclidean pixel errors of one view under `camera` at `pose`.
pub(crate) fn view_errors(
    camera: &CameraModel,
    pose: &Iso3,
    view: &Observation,
) -> Vec<Real> {
    view.iter()
        .map(|(pw, uv)| {
            let proj = camera.project(&pose.transform_point(pw));
            ((uv.x - proj.x).powi(2) + (uv.y - proj.y).powi(2)).sqrt()
        })
        .collect()
}

/// Validate a single-camera calibration against its own observations.
///
/// `poses[i]` maps target coordinates of `views[i]` into the camera frame.
pub fn reprojection_report(
    camera: &CameraModel,
    poses: &[Iso3],
    views: &[Observation],
) -> Result<CalibrationReport> {
    if poses.len() != views.len() {
        return Err(CalibError::ShapeMismatch {
            expected: views.len(),
            got: poses.len(),
        });
    }

    let mut per_view = Vec::with_capacity(views.len());
    let mut all = Vec::new();
    for (pose, view) in poses.iter().zip(views.iter()) {
        let errors = view_errors(camera, pose, view);
        per_view.push(ReprojectionStats::from_errors(&errors));
        all.extend(errors);
    }

    Ok(CalibrationReport {
        per_view,
        overall: ReprojectionStats::from_errors(&all),
    })
}

/// Validate a stereo calibration against both cameras' observations.
///
/// `poses_a[i]` maps target coordinates into camera A for view `i`; camera B
/// sees the target at `rel * poses_a[i]`. Each view's statistics pool both
/// cameras' points.
pub fn stereo_reprojection_report(
    camera_a: &CameraModel,
    camera_b: &CameraModel,
    rel: &Iso3,
    poses_a: &[Iso3],
    views_a: &[Observation],
    views_b: &[Observation],
) -> Result<CalibrationReport> {
    if views_a.len() != views_b.len() {
        return Err(CalibError::ShapeMismatch {
            expected: views_a.len(),
            got: views_b.len(),
        });
    }
    if poses_a.len() != views_a.len() {
        return Err(CalibError::ShapeMismatch {
            expected: views_a.len(),
            got: poses_a.len(),
        });
    }

    let mut per_view = Vec::with_capacity(views_a.len());
    let mut all = Vec::new();
    for ((pose_a, view_a), view_b) in
        poses_a.iter().zip(views_a.iter()).zip(views_b.iter())
    {
        let pose_b = rel * pose_a;
        let mut errors = view_errors(camera_a, pose_a, view_a);
        errors.extend(view_errors(camera_b, &pose_b, view_b));
        per_view.push(ReprojectionStats::from_errors(&errors));
        all.extend(errors);
    }

    Ok(CalibrationReport {
        per_view,
        overall: ReprojectionStats::from_errors(&all),
    })
}
