//! Observation accumulation over frame streams.
//!
//! A [`FrameSource`] yields grayscale frames in capture order. Frames are
//! drained first and detected in parallel with rayon, so per-frame results
//! keep their stream index. Stereo accumulation joins two streams by that
//! index and retains only frames where both cameras saw the full board.

use image::GrayImage;
use rayon::prelude::*;
use stereocal_core::{
    Observation, ObservationSet, Result, SynchronizedObservationPair,
};

use crate::ChessboardDetector;

/// An ordered supplier of grayscale frames.
///
/// `next_frame` returns `Ok(None)` once the stream is exhausted. An `Err`
/// marks the source as unreadable from that point on; frames already
/// delivered stay valid.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<GrayImage>>;
}

/// In-memory frame source backed by a vector of images.
pub struct ImageSequenceSource {
    frames: std::vec::IntoIter<GrayImage>,
}

impl ImageSequenceSource {
    pub fn new(frames: Vec<GrayImage>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<GrayImage>> {
        Ok(self.frames.next())
    }
}

/// Drain a source until exhaustion or a read failure.
///
/// A read failure ends the stream early with a warning; the frames read so
/// far are returned.
fn drain_frames<S: FrameSource>(source: &mut S) -> Vec<GrayImage> {
    let mut frames = Vec::new();
    loop {
        match source.next_frame() {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => break,
            Err(err) => {
                log::warn!(
                    "frame source failed after {} frames: {err}",
                    frames.len()
                );
                break;
            }
        }
    }
    frames
}

/// Run detection over every frame of a stream, in parallel across frames.
///
/// The result is index-aligned with the stream: one entry per frame, `None`
/// where the board was not found.
pub fn detect_stream<S: FrameSource>(
    detector: &ChessboardDetector,
    source: &mut S,
) -> Vec<Option<Observation>> {
    let frames = drain_frames(source);
    let results: Vec<Option<Observation>> = frames
        .par_iter()
        .map(|frame| detector.detect(frame))
        .collect();
    let found = results.iter().filter(|r| r.is_some()).count();
    log::info!("detected board in {found} of {} frames", results.len());
    results
}

/// Accumulate all successful detections of one stream into an
/// [`ObservationSet`] for intrinsic calibration.
pub fn accumulate_observations<S: FrameSource>(
    detector: &ChessboardDetector,
    source: &mut S,
) -> Result<ObservationSet> {
    let mut set = ObservationSet::new(detector.pattern().clone());
    for obs in detect_stream(detector, source).into_iter().flatten() {
        set.add(obs)?;
    }
    Ok(set)
}

/// Accumulate a synchronized pair of streams for stereo calibration.
///
/// Frame `i` of each stream is assumed captured at the same instant; only
/// frames where both detections succeeded are retained.
pub fn accumulate_stereo_observations<A: FrameSource, B: FrameSource>(
    detector: &ChessboardDetector,
    source_a: &mut A,
    source_b: &mut B,
) -> Result<SynchronizedObservationPair> {
    let frames_a = detect_stream(detector, source_a);
    let frames_b = detect_stream(detector, source_b);
    SynchronizedObservationPair::from_frames(detector.pattern().clone(), frames_a, frames_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RefineConfig;
    use image::Luma;
    use stereocal_core::{CalibError, PatternGeometry};

    fn board_image() -> GrayImage {
        let square = 20u32;
        let (rows, cols) = (3u32, 4u32);
        let mut img = GrayImage::new((cols + 1) * square, (rows + 1) * square);
        for y in 0..img.height() {
            for x in 0..img.width() {
                let dark = ((x / square) + (y / square)) % 2 == 0;
                img.put_pixel(x, y, Luma([if dark { 25 } else { 230 }]));
            }
        }
        img
    }

    fn detector() -> ChessboardDetector {
        let pattern = PatternGeometry::new(3, 4, 0.02).unwrap();
        ChessboardDetector::new(pattern, RefineConfig::default()).unwrap()
    }

    struct FailingSource {
        good: usize,
    }

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<GrayImage>> {
            if self.good == 0 {
                return Err(CalibError::FrameSource("device disconnected".into()));
            }
            self.good -= 1;
            Ok(Some(board_image()))
        }
    }

    #[test]
    fn accumulates_only_successful_detections() {
        let flat = GrayImage::from_pixel(100, 80, Luma([128]));
        let mut source =
            ImageSequenceSource::new(vec![board_image(), flat, board_image()]);
        let set = accumulate_observations(&detector(), &mut source).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn read_failure_keeps_earlier_frames() {
        let mut source = FailingSource { good: 2 };
        let set = accumulate_observations(&detector(), &mut source).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn stereo_accumulation_keeps_mutual_detections() {
        let flat = GrayImage::from_pixel(100, 80, Luma([128]));
        // Board visible in frames {0, 2} of A and {0, 1, 2} of B.
        let mut a = ImageSequenceSource::new(vec![
            board_image(),
            flat.clone(),
            board_image(),
        ]);
        let mut b = ImageSequenceSource::new(vec![
            board_image(),
            board_image(),
            board_image(),
        ]);
        let pair = accumulate_stereo_observations(&detector(), &mut a, &mut b).unwrap();
        assert_eq!(pair.len(), 2);
        assert_eq!(pair.frame_indices(), &[0, 2]);
    }
}
