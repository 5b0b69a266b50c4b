//! Checkerboard pattern geometry.

use serde::{Deserialize, Serialize};

use crate::{CalibError, Pt3, Real, Result};

/// Planar checkerboard target: a grid of interior corners on the z = 0
/// plane of the target's local frame.
///
/// The object-point sequence is fixed at construction and never mutated;
/// every observation of the target refers to the same row-major ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternGeometry {
    rows: usize,
    cols: usize,
    square_size: Real,
    object_points: Vec<Pt3>,
}

impl PatternGeometry {
    /// Build the canonical object points for a `rows × cols` interior-corner
    /// grid with physical spacing `square_size`.
    ///
    /// Points are laid out in row-major order: index `r * cols + c` maps to
    /// `(c * square_size, r * square_size, 0)`.
    pub fn new(rows: usize, cols: usize, square_size: Real) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(CalibError::InvalidConfiguration(format!(
                "pattern grid must be non-empty, got {rows}x{cols}"
            )));
        }
        if !(square_size > 0.0) {
            return Err(CalibError::InvalidConfiguration(format!(
                "square size must be positive, got {square_size}"
            )));
        }

        let mut object_points = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                object_points.push(Pt3::new(
                    c as Real * square_size,
                    r as Real * square_size,
                    0.0,
                ));
            }
        }

        Ok(Self {
            rows,
            cols,
            square_size,
            object_points,
        })
    }

    /// Interior-corner rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Interior-corner columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Physical spacing between adjacent corners.
    pub fn square_size(&self) -> Real {
        self.square_size
    }

    /// Total number of corners (`rows * cols`).
    pub fn num_points(&self) -> usize {
        self.object_points.len()
    }

    /// The canonical object-point sequence.
    pub fn object_points(&self) -> &[Pt3] {
        &self.object_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_layout_is_row_major_and_scaled() {
        let pat = PatternGeometry::new(2, 3, 0.5).unwrap();
        assert_eq!(pat.num_points(), 6);
        assert_eq!(pat.object_points()[0], Pt3::new(0.0, 0.0, 0.0));
        assert_eq!(pat.object_points()[1], Pt3::new(0.5, 0.0, 0.0));
        assert_eq!(pat.object_points()[3], Pt3::new(0.0, 0.5, 0.0));
        assert!(pat.object_points().iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn construction_is_deterministic() {
        let a = PatternGeometry::new(6, 9, 9.6).unwrap();
        let b = PatternGeometry::new(6, 9, 9.6).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_grid() {
        assert!(matches!(
            PatternGeometry::new(0, 9, 1.0),
            Err(CalibError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PatternGeometry::new(6, 0, 1.0),
            Err(CalibError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_non_positive_square_size() {
        assert!(PatternGeometry::new(6, 9, 0.0).is_err());
        assert!(PatternGeometry::new(6, 9, -1.0).is_err());
    }
}
