//! Aggregate detection confidence over a fixed set of key landmarks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::landmarks::{LandmarkName, LandmarkSet};
use crate::round_to;

/// The landmarks whose visibility decides how trustworthy a result is.
pub const KEY_LANDMARKS: [LandmarkName; 5] = [
    LandmarkName::Nose,
    LandmarkName::LeftShoulder,
    LandmarkName::RightShoulder,
    LandmarkName::LeftHip,
    LandmarkName::RightHip,
];

/// Visibility above which a key landmark counts as detected.
pub const VISIBLE_THRESHOLD: f32 = 0.5;
/// Visibility above which a landmark is labelled high confidence.
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_visibility(visibility: f32) -> Self {
        if visibility > HIGH_CONFIDENCE_THRESHOLD {
            ConfidenceLevel::High
        } else if visibility > VISIBLE_THRESHOLD {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkAccuracy {
    /// Detector visibility rounded to three decimals.
    pub visibility: f64,
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    /// `key_landmarks_detected / total_key_landmarks`, two decimals.
    pub overall_confidence: f64,
    pub key_landmarks_detected: usize,
    pub total_key_landmarks: usize,
    pub landmark_accuracy: BTreeMap<LandmarkName, LandmarkAccuracy>,
}

impl ConfidenceResult {
    /// The result for an image in which no pose was found.
    pub fn no_pose() -> Self {
        Self {
            overall_confidence: 0.0,
            key_landmarks_detected: 0,
            total_key_landmarks: KEY_LANDMARKS.len(),
            landmark_accuracy: BTreeMap::new(),
        }
    }
}

/// Score a landmark set by how many key landmarks are clearly visible.
///
/// `None` means the detector found no pose; this is a zero-confidence result,
/// not an error.
pub fn assess(landmarks: Option<&LandmarkSet>) -> ConfidenceResult {
    let Some(landmarks) = landmarks else {
        return ConfidenceResult::no_pose();
    };

    let mut landmark_accuracy = BTreeMap::new();
    let mut detected = 0usize;

    for name in KEY_LANDMARKS {
        let Some(lm) = landmarks.get(name) else {
            continue;
        };
        if lm.visibility > VISIBLE_THRESHOLD {
            detected += 1;
        }
        landmark_accuracy.insert(
            name,
            LandmarkAccuracy {
                visibility: round_to(f64::from(lm.visibility), 3),
                confidence: ConfidenceLevel::from_visibility(lm.visibility),
            },
        );
    }

    let total = KEY_LANDMARKS.len();
    ConfidenceResult {
        overall_confidence: round_to(detected as f64 / total as f64, 2),
        key_landmarks_detected: detected,
        total_key_landmarks: total,
        landmark_accuracy,
    }
}
