//! Plane-to-image homography estimation via DLT.

use nalgebra::DMatrix;
use stereocal_core::{CalibError, Mat3, Pt2, Real, Result};

/// Hartley normalisation: translate to the centroid and scale so the mean
/// distance from the origin is sqrt(2).
fn normalizing_transform(points: &[Pt2]) -> Mat3 {
    let n = points.len() as Real;
    let cx = points.iter().map(|p| p.x).sum::<Real>() / n;
    let cy = points.iter().map(|p| p.y).sum::<Real>() / n;

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<Real>()
        / n;
    let s = if mean_dist > Real::EPSILON {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Mat3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn apply(t: &Mat3, p: &Pt2) -> Pt2 {
    let v = t * stereocal_core::to_homogeneous(p);
    stereocal_core::from_homogeneous(&v)
}

/// Estimate `H` such that `image ~ H * world` using the normalised DLT.
///
/// `world` points are the planar target coordinates (z dropped); at least 4
/// correspondences are required.
pub fn dlt_homography(world: &[Pt2], image: &[Pt2]) -> Result<Mat3> {
    let n = world.len();
    if image.len() != n {
        return Err(CalibError::ShapeMismatch {
            expected: n,
            got: image.len(),
        });
    }
    if n < 4 {
        return Err(CalibError::InsufficientCorrespondences { got: n, need: 4 });
    }

    let t_w = normalizing_transform(world);
    let t_i = normalizing_transform(image);

    let mut a = DMatrix::<Real>::zeros(2 * n, 9);
    for (i, (pw, pi)) in world.iter().zip(image.iter()).enumerate() {
        let pw = apply(&t_w, pw);
        let pi = apply(&t_i, pi);
        let (x, y) = (pw.x, pw.y);
        let (u, v) = (pi.x, pi.y);

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // Null vector of A via SVD (smallest singular value).
    let svd = a.svd(true, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::DegenerateGeometry("SVD failed in DLT".into()))?;
    let h = v_t.row(v_t.nrows() - 1);

    let mut h_norm = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_norm[(r, c)] = h[3 * r + c];
        }
    }

    // Undo normalisation: H = T_i^-1 * Hn * T_w.
    let t_i_inv = t_i
        .try_inverse()
        .ok_or_else(|| CalibError::DegenerateGeometry("singular normalisation".into()))?;
    let mut h_mat = t_i_inv * h_norm * t_w;

    let scale = h_mat[(2, 2)];
    if scale.abs() > Real::EPSILON {
        h_mat /= scale;
    }

    Ok(h_mat)
}
