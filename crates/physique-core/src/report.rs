//! Assembly of the per-image analysis record.

use serde::{Deserialize, Serialize};

use crate::confidence::{self, ConfidenceResult};
use crate::geometry::{self, BodyWidthResult};
use crate::landmarks::LandmarkSet;
use crate::pixels::PixelBuffer;
use crate::skin_tone::{self, SkinToneResult};

const NO_POSE: &str = "no pose detected";

/// Output shaping that does not affect the computed metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Strip knee, ankle, heel and foot points from the returned keypoints.
    pub exclude_lower_body: bool,
}

/// Everything derived from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub keypoints: LandmarkSet,
    pub skin_color: SkinToneResult,
    pub body_width: BodyWidthResult,
    pub model_accuracy: ConfidenceResult,
}

impl AnalysisReport {
    /// The record for an image in which no pose was found.
    pub fn no_pose() -> Self {
        Self {
            keypoints: LandmarkSet::new(),
            skin_color: SkinToneResult::error(NO_POSE),
            body_width: BodyWidthResult::error(NO_POSE),
            model_accuracy: ConfidenceResult::no_pose(),
        }
    }
}

/// Run every analysis over one detected pose.
///
/// The three components read the full landmark set independently; lower-body
/// filtering only touches the returned `keypoints`.
pub fn analyze(
    pose: Option<&LandmarkSet>,
    pixels: &PixelBuffer<'_>,
    options: &ReportOptions,
) -> AnalysisReport {
    let Some(landmarks) = pose else {
        return AnalysisReport::no_pose();
    };

    let skin_color = skin_tone::classify(landmarks, pixels);
    let body_width = geometry::body_width(landmarks);
    let model_accuracy = confidence::assess(Some(landmarks));

    let keypoints = if options.exclude_lower_body {
        landmarks.without_lower_body()
    } else {
        landmarks.clone()
    };

    AnalysisReport {
        keypoints,
        skin_color,
        body_width,
        model_accuracy,
    }
}
