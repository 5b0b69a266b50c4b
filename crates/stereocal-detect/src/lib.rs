//! Checkerboard correspondence extraction.
//!
//! [`ChessboardDetector`] locates the interior-corner grid of a planar
//! checkerboard in a grayscale frame and refines each corner to sub-pixel
//! accuracy, producing a full [`stereocal_core::Observation`] or nothing.
//! The `stream` module accumulates observations over frame sources, in
//! parallel across frames.

mod chessboard;
mod refine;
mod stream;

pub use chessboard::*;
pub use refine::*;
pub use stream::*;
