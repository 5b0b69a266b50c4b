//! Observation types accumulated from checkerboard detections.
//!
//! An [`Observation`] is the full, index-aligned (object point, image point)
//! correspondence set extracted from one frame. Partial detections are never
//! admitted; a frame either yields a complete observation or nothing.

use serde::{Deserialize, Serialize};

use crate::{CalibError, PatternGeometry, Pt2, Pt3, Real, Result};

/// One frame's worth of 2D–3D correspondences.
///
/// `image_points[i]` is the detected pixel position of `object_points[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// 3D points in the target frame (the full pattern, z = 0).
    pub object_points: Vec<Pt3>,
    /// Detected pixel positions, one per object point.
    pub image_points: Vec<Pt2>,
}

impl Observation {
    /// Construct an observation, enforcing index alignment.
    pub fn new(object_points: Vec<Pt3>, image_points: Vec<Pt2>) -> Result<Self> {
        if object_points.len() != image_points.len() {
            return Err(CalibError::ShapeMismatch {
                expected: object_points.len(),
                got: image_points.len(),
            });
        }
        Ok(Self {
            object_points,
            image_points,
        })
    }

    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    /// True if the observation holds no correspondences.
    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }

    /// Iterate over `(object point, image point)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Pt3, &Pt2)> {
        self.object_points.iter().zip(self.image_points.iter())
    }
}

/// Append-only sequence of observations of one camera.
///
/// Grows during the capture/extraction phase and is handed to calibration as
/// a read-only borrow afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationSet {
    pattern: PatternGeometry,
    observations: Vec<Observation>,
}

impl ObservationSet {
    /// Empty set for the given target.
    pub fn new(pattern: PatternGeometry) -> Self {
        Self {
            pattern,
            observations: Vec::new(),
        }
    }

    /// Append a full observation of the target.
    ///
    /// Rejects observations whose length does not match the pattern.
    pub fn add(&mut self, observation: Observation) -> Result<()> {
        if observation.len() != self.pattern.num_points() {
            return Err(CalibError::ShapeMismatch {
                expected: self.pattern.num_points(),
                got: observation.len(),
            });
        }
        self.observations.push(observation);
        Ok(())
    }

    /// The target geometry all observations refer to.
    pub fn pattern(&self) -> &PatternGeometry {
        &self.pattern
    }

    /// Accumulated observations, in collection order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of accumulated observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// True if nothing has been collected yet.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Frame-index-aligned observations of the same target from two cameras.
///
/// Only frame indices where both cameras produced a full detection are
/// retained; both sides of each retained index share the same
/// [`PatternGeometry`] object points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizedObservationPair {
    pattern: PatternGeometry,
    views_a: Vec<Observation>,
    views_b: Vec<Observation>,
    frame_indices: Vec<usize>,
}

impl SynchronizedObservationPair {
    /// Join two per-frame detection streams by frame index.
    ///
    /// `frames_a[i]` and `frames_b[i]` are the (possibly missed) detections
    /// from frame `i` of each camera. Streams of different lengths are a
    /// contract error: synchronized captures must be index-aligned.
    pub fn from_frames(
        pattern: PatternGeometry,
        frames_a: Vec<Option<Observation>>,
        frames_b: Vec<Option<Observation>>,
    ) -> Result<Self> {
        if frames_a.len() != frames_b.len() {
            return Err(CalibError::ShapeMismatch {
                expected: frames_a.len(),
                got: frames_b.len(),
            });
        }

        let mut views_a = Vec::new();
        let mut views_b = Vec::new();
        let mut frame_indices = Vec::new();

        for (idx, (fa, fb)) in frames_a.into_iter().zip(frames_b.into_iter()).enumerate() {
            let (Some(a), Some(b)) = (fa, fb) else {
                continue;
            };
            if a.len() != pattern.num_points() || b.len() != pattern.num_points() {
                return Err(CalibError::ShapeMismatch {
                    expected: pattern.num_points(),
                    got: a.len().min(b.len()),
                });
            }
            views_a.push(a);
            views_b.push(b);
            frame_indices.push(idx);
        }

        Ok(Self {
            pattern,
            views_a,
            views_b,
            frame_indices,
        })
    }

    /// The shared target geometry.
    pub fn pattern(&self) -> &PatternGeometry {
        &self.pattern
    }

    /// Retained observations of camera A.
    pub fn views_a(&self) -> &[Observation] {
        &self.views_a
    }

    /// Retained observations of camera B.
    pub fn views_b(&self) -> &[Observation] {
        &self.views_b
    }

    /// Original frame indices of the retained views.
    pub fn frame_indices(&self) -> &[usize] {
        &self.frame_indices
    }

    /// Number of retained synchronized views.
    pub fn len(&self) -> usize {
        self.views_a.len()
    }

    /// True if no frame had a detection in both cameras.
    pub fn is_empty(&self) -> bool {
        self.views_a.is_empty()
    }
}

/// Summary statistics for reprojection errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReprojectionStats {
    /// Mean reprojection error in pixels.
    pub mean: Real,
    /// Root mean square error in pixels.
    pub rms: Real,
    /// Maximum reprojection error in pixels.
    pub max: Real,
    /// Number of points evaluated.
    pub count: usize,
}

impl ReprojectionStats {
    /// Compute statistics from per-point errors.
    pub fn from_errors(errors: &[Real]) -> Self {
        if errors.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                max: 0.0,
                count: 0,
            };
        }

        let sum: Real = errors.iter().sum();
        let sum_sq: Real = errors.iter().map(|e| e * e).sum();
        let max = errors.iter().cloned().fold(0.0_f64, Real::max);
        let n = errors.len() as Real;

        Self {
            mean: sum / n,
            rms: (sum_sq / n).sqrt(),
            max,
            count: errors.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> PatternGeometry {
        PatternGeometry::new(2, 2, 1.0).unwrap()
    }

    fn full_observation(pat: &PatternGeometry, shift: Real) -> Observation {
        let image_points = pat
            .object_points()
            .iter()
            .map(|p| Pt2::new(p.x * 100.0 + shift, p.y * 100.0 + shift))
            .collect();
        Observation::new(pat.object_points().to_vec(), image_points).unwrap()
    }

    #[test]
    fn observation_rejects_mismatched_lengths() {
        let pat = pattern();
        let result = Observation::new(
            pat.object_points().to_vec(),
            vec![Pt2::new(0.0, 0.0)],
        );
        assert!(matches!(result, Err(CalibError::ShapeMismatch { .. })));
    }

    #[test]
    fn observation_set_enforces_pattern_length() {
        let pat = pattern();
        let mut set = ObservationSet::new(pat.clone());
        set.add(full_observation(&pat, 0.0)).unwrap();
        assert_eq!(set.len(), 1);

        let short = Observation::new(
            vec![Pt3::new(0.0, 0.0, 0.0)],
            vec![Pt2::new(1.0, 1.0)],
        )
        .unwrap();
        assert!(set.add(short).is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn synchronized_pair_keeps_only_mutual_detections() {
        let pat = pattern();
        let a = vec![
            Some(full_observation(&pat, 0.0)),
            None,
            Some(full_observation(&pat, 1.0)),
            Some(full_observation(&pat, 2.0)),
        ];
        let b = vec![
            Some(full_observation(&pat, 0.5)),
            Some(full_observation(&pat, 1.5)),
            None,
            Some(full_observation(&pat, 2.5)),
        ];

        let pair = SynchronizedObservationPair::from_frames(pat, a, b).unwrap();
        assert_eq!(pair.len(), 2);
        assert_eq!(pair.frame_indices(), &[0, 3]);
        assert_eq!(pair.views_a().len(), pair.views_b().len());
    }

    #[test]
    fn synchronized_pair_rejects_unaligned_streams() {
        let pat = pattern();
        let a = vec![Some(full_observation(&pat, 0.0))];
        let b: Vec<Option<Observation>> = vec![];
        assert!(SynchronizedObservationPair::from_frames(pat, a, b).is_err());
    }

    #[test]
    fn reprojection_stats_computation() {
        let stats = ReprojectionStats::from_errors(&[1.0, 2.0, 3.0]);
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.rms - (14.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((stats.max - 3.0).abs() < 1e-12);

        let empty = ReprojectionStats::from_errors(&[]);
        assert_eq!(empty.count, 0);
    }

    #[test]
    fn observation_serde_round_trip() {
        let pat = pattern();
        let obs = full_observation(&pat, 0.25);
        let json = serde_json::to_string(&obs).unwrap();
        let restored: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, obs);
    }
}
