//! Zhang's closed-form intrinsic initialisation from plane homographies.

use nalgebra::DMatrix;
use stereocal_core::{CalibError, Intrinsics, Mat3, Real, Result};

/// Build the 6-vector `v_ij(H)` from Zhang's mutual-orthogonality
/// constraints on the homography columns.
fn v_ij(hmtx: &Mat3, i: usize, j: usize) -> nalgebra::SVector<Real, 6> {
    let hi = hmtx.column(i);
    let hj = hmtx.column(j);

    nalgebra::SVector::<Real, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Estimate camera intrinsics `K` from a set of plane homographies.
///
/// Solves `V b = 0` for the image of the absolute conic and decomposes it
/// into `(fx, fy, cx, cy, skew)`. Requires at least 3 homographies for a
/// stable solution.
pub fn intrinsics_from_homographies(hmtxs: &[Mat3]) -> Result<Intrinsics> {
    if hmtxs.len() < 3 {
        return Err(CalibError::InsufficientCorrespondences {
            got: hmtxs.len(),
            need: 3,
        });
    }

    let m = hmtxs.len();
    let mut vmtx = DMatrix::<Real>::zeros(2 * m, 6);

    for (k, hmtx) in hmtxs.iter().enumerate() {
        let v11 = v_ij(hmtx, 0, 0);
        let v22 = v_ij(hmtx, 1, 1);
        let v12 = v_ij(hmtx, 0, 1);

        vmtx.row_mut(2 * k).copy_from(&v12.transpose());
        vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    let svd = vmtx.svd(true, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::DegenerateGeometry("SVD failed in Zhang init".into()))?;
    let b = v_t.row(v_t.nrows() - 1);

    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    let denom_rel = if denom_norm > 0.0 {
        denom.abs() / denom_norm
    } else {
        0.0
    };
    if denom_rel <= 1e-8 {
        return Err(CalibError::DegenerateGeometry(
            "homographies do not constrain the intrinsics (coplanar poses?)".into(),
        ));
    }

    // Zhang's closed-form decomposition of B = K^-T K^-1 (up to scale).
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

    if lambda.signum() != b11.signum() {
        return Err(CalibError::DegenerateGeometry(
            "inconsistent conic signature; check homography quality".into(),
        ));
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    Ok(Intrinsics {
        fx: alpha,
        fy: beta,
        cx: u0,
        cy: v0,
        skew: gamma,
    })
}
