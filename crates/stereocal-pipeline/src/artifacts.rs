//! Persistence of calibration artifacts.
//!
//! All artifacts ([`crate::IntrinsicModel`], [`crate::ExtrinsicModel`],
//! [`crate::RectificationModel`]) and configuration types serialize to JSON.
//! `serde_json` emits shortest round-trip `f64` representations, so saved
//! matrices reload bit-for-bit.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors from saving or loading artifacts; separate from the calibration
/// taxonomy since they concern the filesystem, not the data.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write an artifact as pretty-printed JSON.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ArtifactError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    Ok(())
}

/// Load an artifact previously written by [`save_json`].
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntrinsicModel;
    use stereocal_core::{
        CameraModel, Distortion, Intrinsics, ReprojectionStats,
    };

    #[test]
    fn intrinsic_model_round_trips_through_disk() {
        let model = IntrinsicModel {
            camera: CameraModel {
                intrinsics: Intrinsics {
                    fx: 800.123456789,
                    fy: 799.987654321,
                    cx: 320.5,
                    cy: 240.25,
                    skew: 1e-13,
                },
                distortion: Distortion::RadialTangential5 {
                    k1: -0.123456789012345,
                    k2: 0.01,
                    p1: 0.001,
                    p2: -0.001,
                    k3: 0.0,
                },
            },
            reprojection: ReprojectionStats::from_errors(&[0.1, 0.2, 0.3]),
        };

        let path = std::env::temp_dir().join("stereocal-intrinsic-roundtrip.json");
        save_json(&model, &path).unwrap();
        let restored: IntrinsicModel = load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.camera, model.camera);
        assert_eq!(restored.reprojection.count, model.reprojection.count);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("stereocal-does-not-exist.json");
        let result: Result<IntrinsicModel, _> = load_json(&path);
        assert!(matches!(result, Err(ArtifactError::Io(_))));
    }
}
