//! Joint refinement of intrinsics, distortion and per-view target poses.

use nalgebra::{DVector, UnitQuaternion, Vector3};
use stereocal_core::{
    CameraModel, Distortion, Intrinsics, Iso3, Observation, Real,
};

use crate::NllsProblem;

/// Intrinsics slots in the parameter vector: `fx, fy, cx, cy, skew`.
const INTRINSICS_DIM: usize = 5;
/// Per-view pose block: axis-angle rotation + translation.
const POSE_DIM: usize = 6;

/// Reprojection problem over all observations of one camera.
///
/// The parameter vector is
/// `[fx, fy, cx, cy, skew, d_0..d_{nd-1}, pose_0, pose_1, ...]` where `nd`
/// is the coefficient count of the configured distortion variant and each
/// pose block is axis-angle rotation followed by translation. Rotations are
/// never fit as free matrix entries, so orthonormality is structural.
#[derive(Debug, Clone)]
pub struct IntrinsicsProblem {
    views: Vec<Observation>,
    /// Template fixing the distortion variant (and so the packing length).
    distortion_template: Distortion,
}

impl IntrinsicsProblem {
    pub fn new(views: Vec<Observation>, distortion_template: Distortion) -> Self {
        assert!(!views.is_empty(), "need at least one view for calibration");
        for (i, v) in views.iter().enumerate() {
            assert!(v.len() >= 4, "view {i} has too few points (need >= 4)");
        }
        Self {
            views,
            distortion_template,
        }
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    fn distortion_dim(&self) -> usize {
        self.distortion_template.num_coefficients()
    }

    fn pose_offset(&self, view_idx: usize) -> usize {
        INTRINSICS_DIM + self.distortion_dim() + POSE_DIM * view_idx
    }

    /// Decode the parameter vector into a camera model and per-view poses.
    pub fn decode(&self, x: &DVector<Real>) -> (CameraModel, Vec<Iso3>) {
        assert_eq!(x.len(), self.num_params());

        let intrinsics = Intrinsics {
            fx: x[0],
            fy: x[1],
            cx: x[2],
            cy: x[3],
            skew: x[4],
        };

        let nd = self.distortion_dim();
        let coeffs: Vec<Real> = (0..nd).map(|i| x[INTRINSICS_DIM + i]).collect();
        let distortion = Distortion::from_coefficients(&self.distortion_template, &coeffs);

        let mut poses = Vec::with_capacity(self.num_views());
        for i in 0..self.num_views() {
            let idx = self.pose_offset(i);
            poses.push(decode_pose(x, idx));
        }

        (
            CameraModel {
                intrinsics,
                distortion,
            },
            poses,
        )
    }
}

/// Pack an initial camera model and per-view poses into a parameter vector.
///
/// The camera's distortion variant fixes the packing length; `poses` map
/// target coordinates into the camera frame.
pub fn pack_intrinsics_params(camera: &CameraModel, poses: &[Iso3]) -> DVector<Real> {
    assert!(!poses.is_empty(), "need at least one pose");
    let nd = camera.distortion.num_coefficients();
    let dim = INTRINSICS_DIM + nd + POSE_DIM * poses.len();
    let mut x = DVector::zeros(dim);

    let k = &camera.intrinsics;
    x[0] = k.fx;
    x[1] = k.fy;
    x[2] = k.cx;
    x[3] = k.cy;
    x[4] = k.skew;

    for (i, c) in camera.distortion.coefficients().iter().enumerate() {
        x[INTRINSICS_DIM + i] = *c;
    }

    for (i, pose) in poses.iter().enumerate() {
        encode_pose(&mut x, INTRINSICS_DIM + nd + POSE_DIM * i, pose);
    }

    x
}

pub(crate) fn encode_pose(x: &mut DVector<Real>, idx: usize, pose: &Iso3) {
    let axis_angle = pose.rotation.scaled_axis();
    x[idx] = axis_angle.x;
    x[idx + 1] = axis_angle.y;
    x[idx + 2] = axis_angle.z;

    let t = pose.translation.vector;
    x[idx + 3] = t.x;
    x[idx + 4] = t.y;
    x[idx + 5] = t.z;
}

pub(crate) fn decode_pose(x: &DVector<Real>, idx: usize) -> Iso3 {
    let axis_angle = Vector3::new(x[idx], x[idx + 1], x[idx + 2]);
    let rotation = UnitQuaternion::from_scaled_axis(axis_angle);
    let translation = Vector3::new(x[idx + 3], x[idx + 4], x[idx + 5]);
    Iso3::from_parts(translation.into(), rotation)
}

impl NllsProblem for IntrinsicsProblem {
    fn num_params(&self) -> usize {
        INTRINSICS_DIM + self.distortion_dim() + POSE_DIM * self.num_views()
    }

    fn num_residuals(&self) -> usize {
        self.views.iter().map(|v| 2 * v.len()).sum()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let (camera, poses) = self.decode(x);

        let mut r = DVector::zeros(self.num_residuals());
        let mut offset = 0;

        for (view_idx, view) in self.views.iter().enumerate() {
            let pose = &poses[view_idx];
            for (pw, uv) in view.iter() {
                let p_cam = pose.transform_point(pw);
                let proj = camera.project(&p_cam);

                r[offset] = uv.x - proj.x;
                r[offset + 1] = uv.y - proj.y;
                offset += 2;
            }
        }

        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LmBackend, SolveOptions};
    use stereocal_core::synthetic::{project_pattern, sweep_poses};
    use stereocal_core::PatternGeometry;

    fn ground_truth_camera() -> CameraModel {
        CameraModel {
            intrinsics: Intrinsics {
                fx: 800.0,
                fy: 780.0,
                cx: 640.0,
                cy: 360.0,
                skew: 0.0,
            },
            distortion: Distortion::RadialTangential5 {
                k1: -0.1,
                k2: 0.01,
                p1: 0.001,
                p2: -0.001,
                k3: 0.0,
            },
        }
    }

    #[test]
    fn pose_encoding_round_trips() {
        let pose = Iso3::from_parts(
            Vector3::new(0.1, -0.2, 1.5).into(),
            UnitQuaternion::from_scaled_axis(Vector3::new(0.3, -0.1, 0.05)),
        );
        let mut x = DVector::zeros(6);
        encode_pose(&mut x, 0, &pose);
        let restored = decode_pose(&x, 0);
        assert!((restored.translation.vector - pose.translation.vector).norm() < 1e-14);
        assert!(restored.rotation.angle_to(&pose.rotation) < 1e-14);
    }

    #[test]
    fn refinement_recovers_ground_truth_from_perturbed_start() {
        let cam_gt = ground_truth_camera();
        let pattern = PatternGeometry::new(4, 6, 0.03).unwrap();
        let poses_gt = sweep_poses(6, 0.5, 0.1);

        let views: Vec<Observation> = poses_gt
            .iter()
            .map(|pose| project_pattern(&cam_gt, pose, &pattern).unwrap())
            .collect();

        let problem = IntrinsicsProblem::new(views, cam_gt.distortion);

        let cam_init = CameraModel {
            intrinsics: Intrinsics {
                fx: 780.0,
                fy: 760.0,
                cx: 630.0,
                cy: 350.0,
                skew: 0.0,
            },
            distortion: cam_gt.distortion.zeroed(),
        };
        let x0 = pack_intrinsics_params(&cam_init, &poses_gt);

        let (x_opt, report) = LmBackend.solve(&problem, x0, &SolveOptions::default());
        let (cam_refined, poses_refined) = problem.decode(&x_opt);

        assert!(report.converged, "report: {report:?}");
        assert!(report.final_cost < 1e-10, "cost {}", report.final_cost);
        assert!((cam_refined.intrinsics.fx - 800.0).abs() < 0.5);
        assert!((cam_refined.intrinsics.fy - 780.0).abs() < 0.5);
        assert!((cam_refined.intrinsics.cx - 640.0).abs() < 0.5);
        assert!((cam_refined.intrinsics.cy - 360.0).abs() < 0.5);
        assert_eq!(poses_refined.len(), poses_gt.len());
    }

    #[test]
    fn parameter_dimension_tracks_distortion_variant() {
        let pattern = PatternGeometry::new(3, 3, 1.0).unwrap();
        let pose = sweep_poses(1, 1.0, 0.0)[0];
        let cam = CameraModel {
            intrinsics: ground_truth_camera().intrinsics,
            distortion: Distortion::None,
        };
        let view = project_pattern(&cam, &pose, &pattern).unwrap();

        let none = IntrinsicsProblem::new(vec![view.clone()], Distortion::None);
        assert_eq!(none.num_params(), 5 + 6);

        let rt5 = IntrinsicsProblem::new(
            vec![view.clone()],
            Distortion::RadialTangential5 {
                k1: 0.0,
                k2: 0.0,
                p1: 0.0,
                p2: 0.0,
                k3: 0.0,
            },
        );
        assert_eq!(rt5.num_params(), 5 + 5 + 6);

        let rt8 = IntrinsicsProblem::new(
            vec![view],
            Distortion::RadialTangential8 {
                k1: 0.0,
                k2: 0.0,
                p1: 0.0,
                p2: 0.0,
                k3: 0.0,
                k4: 0.0,
                k5: 0.0,
                k6: 0.0,
            },
        );
        assert_eq!(rt8.num_params(), 5 + 8 + 6);
    }
}
