//! Stereo rectification transforms.
//!
//! Closed-form construction: the relative rotation is split evenly between
//! the cameras, then both are rotated so the baseline becomes the shared
//! x-axis. Corresponding points end up on the same image row, which reduces
//! stereo matching to a 1-D search. The new projection matrices share the
//! focal length and principal point row; `alpha` trades cropping of invalid
//! pixels against losing source pixels.

use nalgebra::{Rotation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use stereocal_core::{
    CalibError, CameraModel, Mat3, Mat34, Mat4, Real, Result, Vec2, Vec3,
};

use crate::{ExtrinsicModel, RectifyConfig};

/// Persisted rectification artifact.
///
/// `r1`/`r2` rotate camera A/B coordinates into the rectified frames;
/// `p1`/`p2` are the new projection matrices and `q` the disparity-to-depth
/// mapping `[u, v, d, 1] -> w·[X, Y, Z, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectificationModel {
    pub r1: Mat3,
    pub r2: Mat3,
    pub p1: Mat34,
    pub p2: Mat34,
    pub q: Mat4,
}

/// Axis-aligned box in rectified pixel coordinates.
#[derive(Debug, Clone, Copy)]
struct Box2 {
    left: Real,
    right: Real,
    top: Real,
    bottom: Real,
}

/// Derive the rectifying transforms for a calibrated stereo pair.
///
/// `image_size` is `(width, height)` of the source frames, shared by both
/// cameras. A near-zero baseline or a baseline along the optical axis is
/// [`CalibError::DegenerateGeometry`].
pub fn stereo_rectify(
    camera_a: &CameraModel,
    camera_b: &CameraModel,
    extrinsics: &ExtrinsicModel,
    image_size: (u32, u32),
    config: &RectifyConfig,
) -> Result<RectificationModel> {
    config.validate()?;
    if image_size.0 < 2 || image_size.1 < 2 {
        return Err(CalibError::InvalidConfiguration(format!(
            "image size must be at least 2x2, got {}x{}",
            image_size.0, image_size.1
        )));
    }

    let t = extrinsics.translation;
    if t.norm() < 1e-9 {
        return Err(CalibError::DegenerateGeometry(
            "stereo baseline is zero".into(),
        ));
    }

    // Split the relative rotation evenly: camera A turns by R^(1/2),
    // camera B by R^(-1/2), leaving both looking along the bisector.
    let q_rel = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
        extrinsics.rotation,
    ));
    let r_half_fwd = q_rel.powf(0.5).to_rotation_matrix();
    let r_half_inv = q_rel.powf(-0.5).to_rotation_matrix();

    // Baseline expressed in the half-rotated frame; build a basis with the
    // baseline as the x-axis.
    let t_half = r_half_inv * t;
    let sign = if t_half.x >= 0.0 { 1.0 } else { -1.0 };
    let e1 = t_half / t_half.norm() * sign;
    let planar_norm = (e1.x * e1.x + e1.y * e1.y).sqrt();
    if planar_norm < 1e-9 {
        return Err(CalibError::DegenerateGeometry(
            "baseline is parallel to the optical axis".into(),
        ));
    }
    let e2 = Vec3::new(-e1.y, e1.x, 0.0) / planar_norm;
    let e3 = e1.cross(&e2);
    let w_rot = Mat3::from_rows(&[e1.transpose(), e2.transpose(), e3.transpose()]);

    let r1 = w_rot * r_half_fwd.matrix();
    let r2 = w_rot * r_half_inv.matrix();

    // Signed baseline along the rectified x-axis.
    let t_rect_x = e1.dot(&t_half);

    // Shared focal length; principal points centre the warped corners.
    let fc = camera_a.intrinsics.fy.min(camera_b.intrinsics.fy);
    let (w, h) = (image_size.0 as Real, image_size.1 as Real);
    let c0 = Vec2::new((w - 1.0) * 0.5, (h - 1.0) * 0.5);

    let corners_a = warp_corners(camera_a, &r1, fc, image_size)?;
    let corners_b = warp_corners(camera_b, &r2, fc, image_size)?;
    let cc_a = c0 - corner_mean(&corners_a);
    let cc_b = c0 - corner_mean(&corners_b);
    let cx = 0.5 * (cc_a.x + cc_b.x);
    let cy = 0.5 * (cc_a.y + cc_b.y);

    // Framing: alpha interpolates between zooming in on the always-valid
    // region and zooming out so every warped source pixel fits.
    let shifted_a: Vec<Vec2> = corners_a.iter().map(|p| p + Vec2::new(cx, cy)).collect();
    let shifted_b: Vec<Vec2> = corners_b.iter().map(|p| p + Vec2::new(cx, cy)).collect();

    let mut s0: Real = 0.0;
    let mut s1 = Real::INFINITY;
    for corners in [&shifted_a, &shifted_b] {
        s0 = s0.max(cover_scale(&inner_box(corners), &c0, w, h));
        s1 = s1.min(fit_scale(&outer_box(corners), &c0, w, h));
    }
    if !s0.is_finite() || !(s1 > 0.0) {
        return Err(CalibError::DegenerateGeometry(
            "rectified field of view is empty".into(),
        ));
    }
    let s = s0 * (1.0 - config.alpha) + s1 * config.alpha;

    let fc_new = fc * s;
    let cx_new = c0.x + s * (cx - c0.x);
    let cy_new = c0.y + s * (cy - c0.y);

    let p1 = Mat34::new(
        fc_new, 0.0, cx_new, 0.0, //
        0.0, fc_new, cy_new, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    );
    let p2 = Mat34::new(
        fc_new, 0.0, cx_new, fc_new * t_rect_x, //
        0.0, fc_new, cy_new, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    );

    // Shared principal point gives zero disparity at infinity.
    let q = Mat4::new(
        1.0, 0.0, 0.0, -cx_new, //
        0.0, 1.0, 0.0, -cy_new, //
        0.0, 0.0, 0.0, fc_new, //
        0.0, 0.0, -1.0 / t_rect_x, 0.0,
    );

    Ok(RectificationModel { r1, r2, p1, p2, q })
}

/// Warp the four image corners through undistortion, the rectifying
/// rotation and a centred projection with focal length `fc`.
fn warp_corners(
    camera: &CameraModel,
    rect_rot: &Mat3,
    fc: Real,
    image_size: (u32, u32),
) -> Result<Vec<Vec2>> {
    let (w, h) = (image_size.0 as Real - 1.0, image_size.1 as Real - 1.0);
    let corners = [
        Vec2::new(0.0, 0.0),
        Vec2::new(w, 0.0),
        Vec2::new(w, h),
        Vec2::new(0.0, h),
    ];

    corners
        .iter()
        .map(|uv| {
            let n = camera.pixel_to_normalized(uv).ok_or_else(|| {
                CalibError::DegenerateGeometry("singular calibration matrix".into())
            })?;
            let ray = rect_rot * Vec3::new(n.x, n.y, 1.0);
            if ray.z <= 1e-9 {
                return Err(CalibError::DegenerateGeometry(
                    "image corner leaves the rectified field of view".into(),
                ));
            }
            Ok(Vec2::new(fc * ray.x / ray.z, fc * ray.y / ray.z))
        })
        .collect()
}

fn corner_mean(corners: &[Vec2]) -> Vec2 {
    corners.iter().fold(Vec2::zeros(), |acc, p| acc + p) / corners.len() as Real
}

/// Largest axis-aligned box containing all corners.
fn outer_box(corners: &[Vec2]) -> Box2 {
    Box2 {
        left: corners.iter().map(|p| p.x).fold(Real::INFINITY, Real::min),
        right: corners.iter().map(|p| p.x).fold(Real::NEG_INFINITY, Real::max),
        top: corners.iter().map(|p| p.y).fold(Real::INFINITY, Real::min),
        bottom: corners.iter().map(|p| p.y).fold(Real::NEG_INFINITY, Real::max),
    }
}

/// Axis-aligned box inscribed in the warped quad, taking corners in
/// top-left, top-right, bottom-right, bottom-left order.
fn inner_box(corners: &[Vec2]) -> Box2 {
    Box2 {
        left: corners[0].x.max(corners[3].x),
        right: corners[1].x.min(corners[2].x),
        top: corners[0].y.max(corners[1].y),
        bottom: corners[2].y.min(corners[3].y),
    }
}

/// Smallest zoom about the image centre that makes `b` cover the image.
fn cover_scale(b: &Box2, c0: &Vec2, w: Real, h: Real) -> Real {
    let mut s: Real = 0.0;
    if b.left < c0.x {
        s = s.max(c0.x / (c0.x - b.left));
    } else {
        return Real::INFINITY;
    }
    if b.right > c0.x {
        s = s.max((w - 1.0 - c0.x) / (b.right - c0.x));
    } else {
        return Real::INFINITY;
    }
    if b.top < c0.y {
        s = s.max(c0.y / (c0.y - b.top));
    } else {
        return Real::INFINITY;
    }
    if b.bottom > c0.y {
        s = s.max((h - 1.0 - c0.y) / (b.bottom - c0.y));
    } else {
        return Real::INFINITY;
    }
    s
}

/// Largest zoom about the image centre that keeps `b` inside the image.
fn fit_scale(b: &Box2, c0: &Vec2, w: Real, h: Real) -> Real {
    let mut s = Real::INFINITY;
    if b.left < c0.x {
        s = s.min(c0.x / (c0.x - b.left));
    }
    if b.right > c0.x {
        s = s.min((w - 1.0 - c0.x) / (b.right - c0.x));
    }
    if b.top < c0.y {
        s = s.min(c0.y / (c0.y - b.top));
    }
    if b.bottom > c0.y {
        s = s.min((h - 1.0 - c0.y) / (b.bottom - c0.y));
    }
    s
}
