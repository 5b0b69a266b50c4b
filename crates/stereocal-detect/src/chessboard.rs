//! Checkerboard interior-corner detection.
//!
//! Detection pipeline: Harris corner response over the whole frame,
//! non-maximum suppression, then assignment of the strongest candidates to
//! the expected `rows × cols` grid using the principal axes of the candidate
//! cloud and 1-D k-means along each axis. Detection is all-or-nothing: a
//! frame either yields the full grid or a miss.

use image::GrayImage;
use nalgebra::{Matrix2, SymmetricEigen, Vector2};
use stereocal_core::{Observation, PatternGeometry, Pt2, Real, Result};

use crate::{refine_corners, RefineConfig};

/// Harris sensitivity constant.
const HARRIS_K: Real = 0.04;
/// Candidates kept per expected corner before grid assignment.
const CANDIDATE_FACTOR: usize = 10;

/// Locates the checkerboard grid in grayscale frames.
///
/// The detector owns the target description; every returned observation
/// carries the pattern's canonical object points, index-aligned with the
/// detected corners.
#[derive(Debug, Clone)]
pub struct ChessboardDetector {
    pattern: PatternGeometry,
    refine: RefineConfig,
}

impl ChessboardDetector {
    /// Build a detector for `pattern` with the given refinement criteria.
    pub fn new(pattern: PatternGeometry, refine: RefineConfig) -> Result<Self> {
        refine.validate()?;
        Ok(Self { pattern, refine })
    }

    /// The target this detector searches for.
    pub fn pattern(&self) -> &PatternGeometry {
        &self.pattern
    }

    /// Attempt to extract the full corner grid from one frame.
    ///
    /// Returns `None` on a detection miss; never a partial observation. The
    /// frame is not retained.
    pub fn detect(&self, image: &GrayImage) -> Option<Observation> {
        let need = self.pattern.num_points();
        if image.width() < 8 || image.height() < 8 {
            return None;
        }

        let response = harris_response(image, HARRIS_K, 1);
        let max_r = response
            .values
            .iter()
            .copied()
            .fold(Real::NEG_INFINITY, Real::max)
            .max(0.0);
        if max_r <= 0.0 {
            return None;
        }

        let mut candidates = local_maxima(&response, max_r * 0.01);
        if candidates.len() < need {
            return None;
        }

        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(need * CANDIDATE_FACTOR);

        let mut corners =
            assign_to_grid(&candidates, self.pattern.rows(), self.pattern.cols())?;
        refine_corners(image, &mut corners, &self.refine);

        // Full-length by construction; Observation re-checks the alignment.
        Observation::new(self.pattern.object_points().to_vec(), corners).ok()
    }
}

struct ResponseMap {
    values: Vec<Real>,
    width: usize,
    height: usize,
}

/// Harris corner response with central-difference gradients and a square
/// structure-tensor window.
fn harris_response(image: &GrayImage, k: Real, win_radius: usize) -> ResponseMap {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let mut ix = vec![0.0_f64; width * height];
    let mut iy = vec![0.0_f64; width * height];

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = image.get_pixel((x + 1) as u32, y as u32)[0] as Real
                - image.get_pixel((x - 1) as u32, y as u32)[0] as Real;
            let gy = image.get_pixel(x as u32, (y + 1) as u32)[0] as Real
                - image.get_pixel(x as u32, (y - 1) as u32)[0] as Real;
            ix[y * width + x] = gx * 0.5;
            iy[y * width + x] = gy * 0.5;
        }
    }

    let mut values = vec![0.0_f64; width * height];
    let r = win_radius as i32;
    for y in win_radius..height - win_radius {
        for x in win_radius..width - win_radius {
            let mut sxx = 0.0;
            let mut sxy = 0.0;
            let mut syy = 0.0;
            for dy in -r..=r {
                for dx in -r..=r {
                    let xx = (x as i32 + dx) as usize;
                    let yy = (y as i32 + dy) as usize;
                    let gx = ix[yy * width + xx];
                    let gy = iy[yy * width + xx];
                    sxx += gx * gx;
                    sxy += gx * gy;
                    syy += gy * gy;
                }
            }
            let det = sxx * syy - sxy * sxy;
            let trace = sxx + syy;
            values[y * width + x] = det - k * trace * trace;
        }
    }

    ResponseMap {
        values,
        width,
        height,
    }
}

/// 3×3 non-maximum suppression above `threshold`, returning `(x, y, score)`.
fn local_maxima(response: &ResponseMap, threshold: Real) -> Vec<(Real, Real, Real)> {
    let mut out = Vec::new();
    for y in 1..response.height - 1 {
        for x in 1..response.width - 1 {
            let r = response.values[y * response.width + x];
            if r <= threshold {
                continue;
            }
            let mut is_max = true;
            'window: for yy in (y - 1)..=(y + 1) {
                for xx in (x - 1)..=(x + 1) {
                    if (xx != x || yy != y) && response.values[yy * response.width + xx] > r {
                        is_max = false;
                        break 'window;
                    }
                }
            }
            if is_max {
                out.push((x as Real, y as Real, r));
            }
        }
    }
    out
}

/// Assign candidates to the `rows × cols` grid.
///
/// Projects the candidate cloud onto its principal axes, clusters each axis
/// with 1-D k-means, then greedily matches the nearest unused candidate to
/// each cluster-centre crossing. The axes are oriented so the output is
/// top-to-bottom, left-to-right for a roughly upright board.
fn assign_to_grid(
    candidates: &[(Real, Real, Real)],
    rows: usize,
    cols: usize,
) -> Option<Vec<Pt2>> {
    let points: Vec<Vector2<Real>> = candidates
        .iter()
        .map(|(x, y, _)| Vector2::new(*x, *y))
        .collect();
    if points.len() < rows * cols {
        return None;
    }

    let mean = points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / points.len() as Real;
    let mut cov = Matrix2::<Real>::zeros();
    for p in &points {
        let d = p - mean;
        cov += d * d.transpose();
    }
    cov /= points.len() as Real;

    let eig = SymmetricEigen::new(cov);
    let (i0, i1) = if eig.eigenvalues[0] >= eig.eigenvalues[1] {
        (0usize, 1usize)
    } else {
        (1usize, 0usize)
    };
    let mut e_col = eig.eigenvectors.column(i0).into_owned();
    let mut e_row = eig.eigenvectors.column(i1).into_owned();
    // Canonical orientation: columns increase with +x, rows with +y.
    if e_col.x < 0.0 {
        e_col = -e_col;
    }
    if e_row.y < 0.0 {
        e_row = -e_row;
    }

    let uv: Vec<(Real, Real)> = points
        .iter()
        .map(|p| {
            let d = p - mean;
            (d.dot(&e_col), d.dot(&e_row))
        })
        .collect();

    let u_vals: Vec<Real> = uv.iter().map(|(u, _)| *u).collect();
    let v_vals: Vec<Real> = uv.iter().map(|(_, v)| *v).collect();
    let mut u_centers = kmeans_1d(&u_vals, cols, 30);
    let mut v_centers = kmeans_1d(&v_vals, rows, 30);
    u_centers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    v_centers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut used = vec![false; points.len()];
    let mut out = Vec::with_capacity(rows * cols);
    for vc in &v_centers {
        for uc in &u_centers {
            let mut best = None;
            let mut best_cost = Real::INFINITY;
            for (i, (u, v)) in uv.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let cost = (u - uc).powi(2) + (v - vc).powi(2);
                if cost < best_cost {
                    best_cost = cost;
                    best = Some(i);
                }
            }
            let idx = best?;
            used[idx] = true;
            out.push(Pt2::new(points[idx].x, points[idx].y));
        }
    }
    Some(out)
}

/// 1-D k-means used to locate the grid lines along one principal axis.
fn kmeans_1d(values: &[Real], k: usize, iters: usize) -> Vec<Real> {
    let min_v = values.iter().copied().fold(Real::INFINITY, Real::min);
    let max_v = values.iter().copied().fold(Real::NEG_INFINITY, Real::max);
    if k == 1 || (max_v - min_v).abs() < 1e-12 {
        return vec![0.5 * (min_v + max_v); k];
    }

    let mut centers: Vec<Real> = (0..k)
        .map(|i| min_v + i as Real * (max_v - min_v) / (k as Real - 1.0))
        .collect();

    for _ in 0..iters {
        let mut sums = vec![0.0_f64; k];
        let mut counts = vec![0usize; k];
        for &v in values {
            let mut best = 0usize;
            let mut best_dist = (v - centers[0]).abs();
            for (i, &c) in centers.iter().enumerate().skip(1) {
                let d = (v - c).abs();
                if d < best_dist {
                    best_dist = d;
                    best = i;
                }
            }
            sums[best] += v;
            counts[best] += 1;
        }
        for i in 0..k {
            if counts[i] > 0 {
                centers[i] = sums[i] / counts[i] as Real;
            }
        }
    }
    centers
}
