//! Body geometry from shoulder and hip landmarks.
//!
//! All measurements are in image pixels. A missing landmark propagates as
//! `None` rather than an error; only the body-width record as a whole
//! reports missing inputs, and it does so as a value.

use serde::{Deserialize, Serialize};

use crate::landmarks::{Landmark, LandmarkName, LandmarkSet};
use crate::round_to;

/// Shoulder/hip ratio above which a body reads as inverted-triangle.
pub const BROAD_SHOULDER_RATIO: f64 = 1.2;
/// Shoulder/hip ratio below which a body reads as pear.
pub const NARROW_SHOULDER_RATIO: f64 = 0.8;

const MISSING_LANDMARKS: &str = "Missing landmarks for body width";

/// Categorical body shape derived from the shoulder-to-hip ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyShape {
    /// Shoulders clearly wider than hips.
    #[serde(rename = "Inverted Triangle")]
    InvertedTriangle,
    /// Hips clearly wider than shoulders.
    Pear,
    /// Shoulders and hips within 20% of each other.
    Rectangle,
    Unknown,
}

impl BodyShape {
    /// Classify a shoulder/hip ratio. `None` yields [`BodyShape::Unknown`].
    pub fn from_ratio(ratio: Option<f64>) -> Self {
        match ratio {
            Some(r) if r > BROAD_SHOULDER_RATIO => BodyShape::InvertedTriangle,
            Some(r) if r < NARROW_SHOULDER_RATIO => BodyShape::Pear,
            Some(_) => BodyShape::Rectangle,
            None => BodyShape::Unknown,
        }
    }
}

/// Pixel measurements of the upper body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurements {
    pub shoulder_width_px: u32,
    pub hip_width_px: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torso_length_px: Option<u32>,
    /// `None` when the hip width is zero.
    pub shoulder_to_hip_ratio: Option<f64>,
    pub body_shape: BodyShape,
}

/// Either a full set of body measurements or the reason they are missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyWidthResult {
    Error { error: String },
    Measured(BodyMeasurements),
}

impl BodyWidthResult {
    pub fn error(message: impl Into<String>) -> Self {
        BodyWidthResult::Error {
            error: message.into(),
        }
    }

    pub fn measurements(&self) -> Option<&BodyMeasurements> {
        match self {
            BodyWidthResult::Measured(m) => Some(m),
            BodyWidthResult::Error { .. } => None,
        }
    }
}

/// Euclidean pixel distance between two landmarks, truncated to an integer.
///
/// Returns `None` if either point is absent. Distances beyond `u32::MAX`
/// saturate to `u32::MAX`.
pub fn distance(p1: Option<&Landmark>, p2: Option<&Landmark>) -> Option<u32> {
    let (a, b) = (p1?, p2?);
    let dx = f64::from(a.x) - f64::from(b.x);
    let dy = f64::from(a.y) - f64::from(b.y);
    Some((dx * dx + dy * dy).sqrt() as u32)
}

/// Integer midpoint of two landmarks. Depth and visibility are averaged.
pub fn midpoint(a: &Landmark, b: &Landmark) -> Landmark {
    // Sum in i64 so extreme coordinates cannot overflow
    let half = |p: i32, q: i32| ((i64::from(p) + i64::from(q)) / 2) as i32;
    Landmark::new(
        half(a.x, b.x),
        half(a.y, b.y),
        (a.z + b.z) / 2.0,
        (a.visibility + b.visibility) / 2.0,
    )
}

/// Shoulder/hip ratio rounded to two decimals, absent when either width is
/// missing or the hip width is not positive.
pub fn shoulder_to_hip_ratio(shoulder_width: Option<u32>, hip_width: Option<u32>) -> Option<f64> {
    match (shoulder_width, hip_width) {
        (Some(s), Some(h)) if h > 0 => Some(round_to(f64::from(s) / f64::from(h), 2)),
        _ => None,
    }
}

/// Torso length, preferring a single visible side.
///
/// Left shoulder to left hip, then right shoulder to right hip, then the
/// shoulder midpoint to the hip midpoint when all four points exist.
pub fn torso_length(landmarks: &LandmarkSet) -> Option<u32> {
    let ls = landmarks.get(LandmarkName::LeftShoulder);
    let rs = landmarks.get(LandmarkName::RightShoulder);
    let lh = landmarks.get(LandmarkName::LeftHip);
    let rh = landmarks.get(LandmarkName::RightHip);

    distance(ls, lh).or_else(|| distance(rs, rh)).or_else(|| {
        let shoulders = midpoint(ls?, rs?);
        let hips = midpoint(lh?, rh?);
        distance(Some(&shoulders), Some(&hips))
    })
}

/// Measure shoulder and hip widths and classify the body shape.
pub fn body_width(landmarks: &LandmarkSet) -> BodyWidthResult {
    let shoulder_width = distance(
        landmarks.get(LandmarkName::LeftShoulder),
        landmarks.get(LandmarkName::RightShoulder),
    );
    let hip_width = distance(
        landmarks.get(LandmarkName::LeftHip),
        landmarks.get(LandmarkName::RightHip),
    );

    let (Some(shoulder_width_px), Some(hip_width_px)) = (shoulder_width, hip_width) else {
        tracing::debug!(
            shoulders = shoulder_width.is_some(),
            hips = hip_width.is_some(),
            "body width: required landmarks missing"
        );
        return BodyWidthResult::error(MISSING_LANDMARKS);
    };

    let ratio = shoulder_to_hip_ratio(shoulder_width, hip_width);
    let body_shape = BodyShape::from_ratio(ratio);
    let torso_length_px = torso_length(landmarks);

    tracing::debug!(
        shoulder_width_px,
        hip_width_px,
        ratio = ?ratio,
        shape = ?body_shape,
        "body width measured"
    );

    BodyWidthResult::Measured(BodyMeasurements {
        shoulder_width_px,
        hip_width_px,
        torso_length_px,
        shoulder_to_hip_ratio: ratio,
        body_shape,
    })
}
