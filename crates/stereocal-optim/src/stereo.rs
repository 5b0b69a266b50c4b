//! Stereo extrinsic refinement with fixed intrinsics.

use nalgebra::DVector;
use stereocal_core::{CameraModel, Iso3, Observation, Real};

use crate::intrinsics::{decode_pose, encode_pose};
use crate::NllsProblem;

const POSE_DIM: usize = 6;

/// Joint refinement of the shared relative pose `T_B_A` and the per-view
/// target poses `T_A_target`, holding both camera models fixed.
///
/// Parameter vector: `[rel_pose, pose_0, pose_1, ...]`, each block
/// axis-angle + translation. Residuals stack both cameras' reprojection
/// errors per view: camera A sees the target at `pose_i`, camera B at
/// `rel * pose_i`.
#[derive(Debug, Clone)]
pub struct StereoExtrinsicsProblem {
    camera_a: CameraModel,
    camera_b: CameraModel,
    views_a: Vec<Observation>,
    views_b: Vec<Observation>,
}

impl StereoExtrinsicsProblem {
    pub fn new(
        camera_a: CameraModel,
        camera_b: CameraModel,
        views_a: Vec<Observation>,
        views_b: Vec<Observation>,
    ) -> Self {
        assert_eq!(
            views_a.len(),
            views_b.len(),
            "synchronized views must be index-aligned"
        );
        assert!(!views_a.is_empty(), "need at least one synchronized view");
        for (a, b) in views_a.iter().zip(views_b.iter()) {
            assert_eq!(a.len(), b.len(), "views must observe the same target");
        }
        Self {
            camera_a,
            camera_b,
            views_a,
            views_b,
        }
    }

    pub fn num_views(&self) -> usize {
        self.views_a.len()
    }

    /// Decode into the relative pose and the per-view target poses.
    pub fn decode(&self, x: &DVector<Real>) -> (Iso3, Vec<Iso3>) {
        assert_eq!(x.len(), self.num_params());
        let rel = decode_pose(x, 0);
        let poses = (0..self.num_views())
            .map(|i| decode_pose(x, POSE_DIM * (i + 1)))
            .collect();
        (rel, poses)
    }
}

/// Pack the initial relative pose and per-view target poses.
pub fn pack_stereo_params(rel: &Iso3, poses_a: &[Iso3]) -> DVector<Real> {
    assert!(!poses_a.is_empty(), "need at least one pose");
    let mut x = DVector::zeros(POSE_DIM * (poses_a.len() + 1));
    encode_pose(&mut x, 0, rel);
    for (i, pose) in poses_a.iter().enumerate() {
        encode_pose(&mut x, POSE_DIM * (i + 1), pose);
    }
    x
}

impl NllsProblem for StereoExtrinsicsProblem {
    fn num_params(&self) -> usize {
        POSE_DIM * (self.num_views() + 1)
    }

    fn num_residuals(&self) -> usize {
        self.views_a
            .iter()
            .zip(self.views_b.iter())
            .map(|(a, b)| 2 * (a.len() + b.len()))
            .sum()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let (rel, poses) = self.decode(x);

        let mut r = DVector::zeros(self.num_residuals());
        let mut offset = 0;

        for (view_idx, (view_a, view_b)) in
            self.views_a.iter().zip(self.views_b.iter()).enumerate()
        {
            let pose_a = poses[view_idx];
            let pose_b = rel * pose_a;

            for (pw, uv) in view_a.iter() {
                let proj = self.camera_a.project(&pose_a.transform_point(pw));
                r[offset] = uv.x - proj.x;
                r[offset + 1] = uv.y - proj.y;
                offset += 2;
            }
            for (pw, uv) in view_b.iter() {
                let proj = self.camera_b.project(&pose_b.transform_point(pw));
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
    use nalgebra::{Translation3, UnitQuaternion, Vector3};
    use stereocal_core::synthetic::{project_pattern, sweep_poses};
    use stereocal_core::{Distortion, Intrinsics, PatternGeometry};

    fn camera(fx: Real, cx: Real) -> CameraModel {
        CameraModel {
            intrinsics: Intrinsics {
                fx,
                fy: fx,
                cx,
                cy: 240.0,
                skew: 0.0,
            },
            distortion: Distortion::None,
        }
    }

    #[test]
    fn refinement_recovers_known_baseline() {
        let cam_a = camera(800.0, 320.0);
        let cam_b = camera(810.0, 325.0);
        let pattern = PatternGeometry::new(4, 6, 0.03).unwrap();

        let rel_gt = Iso3::from_parts(
            Translation3::new(0.1, 0.0, 0.0),
            UnitQuaternion::from_scaled_axis(Vector3::new(0.0, -0.02, 0.0)),
        );

        let poses_a = sweep_poses(10, 0.6, 0.05);
        let mut views_a = Vec::new();
        let mut views_b = Vec::new();
        for pose_a in &poses_a {
            views_a.push(project_pattern(&cam_a, pose_a, &pattern).unwrap());
            views_b.push(project_pattern(&cam_b, &(rel_gt * pose_a), &pattern).unwrap());
        }

        let problem = StereoExtrinsicsProblem::new(cam_a, cam_b, views_a, views_b);

        // Perturbed start: wrong baseline and rotation.
        let rel_init = Iso3::from_parts(
            Translation3::new(0.12, 0.01, -0.01),
            UnitQuaternion::identity(),
        );
        let x0 = pack_stereo_params(&rel_init, &poses_a);

        let (x_opt, report) = LmBackend.solve(&problem, x0, &SolveOptions::default());
        let (rel, _) = problem.decode(&x_opt);

        assert!(report.converged, "report: {report:?}");
        assert!(report.final_cost < 1e-10, "cost {}", report.final_cost);
        assert!(
            (rel.translation.vector - rel_gt.translation.vector).norm() < 1e-5,
            "T = {:?}",
            rel.translation.vector
        );
        assert!(rel.rotation.angle_to(&rel_gt.rotation) < 1e-6);

        // Axis-angle parameterization keeps R structurally orthonormal.
        let r = rel.rotation.to_rotation_matrix();
        let rrt = r.matrix() * r.matrix().transpose();
        assert!((rrt - stereocal_core::Mat3::identity()).norm() < 1e-12);
        assert!((r.matrix().determinant() - 1.0).abs() < 1e-12);
    }
}
