//! Pose-landmark detection.
//!
//! [`PoseDetector`] is the seam between pixels and landmarks. The engine owns
//! exactly one detector and calls it serially; nothing here is global.
//! [`MoveNetDetector`] runs a single-pose MoveNet ONNX model through ONNX
//! Runtime and maps its 17 COCO keypoints onto the landmark vocabulary.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::landmarks::{LandmarkName, LandmarkSet};

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("failed to load pose model {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("pose inference failed: {0}")]
    Inference(String),
    #[error("unexpected pose model output: {0}")]
    Output(String),
}

/// Something that finds a single human pose in an image.
pub trait PoseDetector: Send {
    /// Detect landmarks in pixel coordinates of `image`.
    ///
    /// `Ok(None)` means no pose was found.
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>, DetectorError>;
}

/// Square input edge expected by MoveNet SinglePose Lightning.
pub const MOVENET_INPUT_SIZE: u32 = 192;

/// Default mean keypoint score below which no pose is reported.
pub const DEFAULT_MIN_POSE_SCORE: f32 = 0.2;

/// MoveNet output order (COCO-17).
const COCO_KEYPOINTS: [LandmarkName; 17] = [
    LandmarkName::Nose,
    LandmarkName::LeftEye,
    LandmarkName::RightEye,
    LandmarkName::LeftEar,
    LandmarkName::RightEar,
    LandmarkName::LeftShoulder,
    LandmarkName::RightShoulder,
    LandmarkName::LeftElbow,
    LandmarkName::RightElbow,
    LandmarkName::LeftWrist,
    LandmarkName::RightWrist,
    LandmarkName::LeftHip,
    LandmarkName::RightHip,
    LandmarkName::LeftKnee,
    LandmarkName::RightKnee,
    LandmarkName::LeftAnkle,
    LandmarkName::RightAnkle,
];

pub struct MoveNetDetector {
    session: Session,
    min_pose_score: f32,
}

impl MoveNetDetector {
    /// Load a MoveNet SinglePose ONNX model from disk.
    pub fn load(path: impl AsRef<Path>, min_pose_score: f32) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        let load_err = |reason: String| DetectorError::Load {
            path: path.to_path_buf(),
            reason,
        };

        let session = Session::builder()
            .map_err(|e| load_err(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| load_err(e.to_string()))?;

        tracing::debug!(path = %path.display(), min_pose_score, "MoveNet session created");

        Ok(Self {
            session,
            min_pose_score,
        })
    }
}

impl PoseDetector for MoveNetDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>, DetectorError> {
        let input = preprocess(image);
        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| DetectorError::Output("model produced no outputs".into()))?;
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Output(e.to_string()))?;

        tracing::trace!(shape = ?shape, "MoveNet output");

        decode_keypoints(data, image.width(), image.height(), self.min_pose_score)
    }
}

/// Resize to the model's square input and lay out as `[1, H, W, 3]` with raw
/// 0–255 channel values.
fn preprocess(image: &RgbImage) -> Array4<f32> {
    let size = MOVENET_INPUT_SIZE;
    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    let mut input = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
    for (x, y, px) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, y as usize, x as usize, c]] = f32::from(px[c]);
        }
    }
    input
}

/// Turn MoveNet's `[1, 1, 17, 3]` `(y, x, score)` rows into a landmark set in
/// pixel coordinates of the original image.
fn decode_keypoints(
    data: &[f32],
    width: u32,
    height: u32,
    min_pose_score: f32,
) -> Result<Option<LandmarkSet>, DetectorError> {
    let needed = COCO_KEYPOINTS.len() * 3;
    if data.len() < needed {
        return Err(DetectorError::Output(format!(
            "expected at least {needed} values, got {}",
            data.len()
        )));
    }

    let rows: Vec<_> = data[..needed].chunks_exact(3).collect();
    let mean_score = rows.iter().map(|r| r[2]).sum::<f32>() / rows.len() as f32;
    if mean_score < min_pose_score {
        tracing::debug!(mean_score, min_pose_score, "no pose above score threshold");
        return Ok(None);
    }

    let points = COCO_KEYPOINTS.iter().zip(rows).map(|(name, row)| {
        let (ny, nx, score) = (row[0], row[1], row[2]);
        (*name, nx, ny, 0.0, score.clamp(0.0, 1.0))
    });

    Ok(Some(LandmarkSet::from_normalized(points, width, height)))
}
