//! Pose landmark vocabulary and the per-image landmark set.
//!
//! Landmark names form a closed vocabulary: the 33 full-body points in the
//! order pose detectors conventionally emit them. A name missing from a
//! [`LandmarkSet`] means the point was not detected.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named anatomical point reported by the pose detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkName {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl LandmarkName {
    /// Every name, in detector index order.
    pub const ALL: [LandmarkName; 33] = [
        LandmarkName::Nose,
        LandmarkName::LeftEyeInner,
        LandmarkName::LeftEye,
        LandmarkName::LeftEyeOuter,
        LandmarkName::RightEyeInner,
        LandmarkName::RightEye,
        LandmarkName::RightEyeOuter,
        LandmarkName::LeftEar,
        LandmarkName::RightEar,
        LandmarkName::MouthLeft,
        LandmarkName::MouthRight,
        LandmarkName::LeftShoulder,
        LandmarkName::RightShoulder,
        LandmarkName::LeftElbow,
        LandmarkName::RightElbow,
        LandmarkName::LeftWrist,
        LandmarkName::RightWrist,
        LandmarkName::LeftPinky,
        LandmarkName::RightPinky,
        LandmarkName::LeftIndex,
        LandmarkName::RightIndex,
        LandmarkName::LeftThumb,
        LandmarkName::RightThumb,
        LandmarkName::LeftHip,
        LandmarkName::RightHip,
        LandmarkName::LeftKnee,
        LandmarkName::RightKnee,
        LandmarkName::LeftAnkle,
        LandmarkName::RightAnkle,
        LandmarkName::LeftHeel,
        LandmarkName::RightHeel,
        LandmarkName::LeftFootIndex,
        LandmarkName::RightFootIndex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LandmarkName::Nose => "nose",
            LandmarkName::LeftEyeInner => "left_eye_inner",
            LandmarkName::LeftEye => "left_eye",
            LandmarkName::LeftEyeOuter => "left_eye_outer",
            LandmarkName::RightEyeInner => "right_eye_inner",
            LandmarkName::RightEye => "right_eye",
            LandmarkName::RightEyeOuter => "right_eye_outer",
            LandmarkName::LeftEar => "left_ear",
            LandmarkName::RightEar => "right_ear",
            LandmarkName::MouthLeft => "mouth_left",
            LandmarkName::MouthRight => "mouth_right",
            LandmarkName::LeftShoulder => "left_shoulder",
            LandmarkName::RightShoulder => "right_shoulder",
            LandmarkName::LeftElbow => "left_elbow",
            LandmarkName::RightElbow => "right_elbow",
            LandmarkName::LeftWrist => "left_wrist",
            LandmarkName::RightWrist => "right_wrist",
            LandmarkName::LeftPinky => "left_pinky",
            LandmarkName::RightPinky => "right_pinky",
            LandmarkName::LeftIndex => "left_index",
            LandmarkName::RightIndex => "right_index",
            LandmarkName::LeftThumb => "left_thumb",
            LandmarkName::RightThumb => "right_thumb",
            LandmarkName::LeftHip => "left_hip",
            LandmarkName::RightHip => "right_hip",
            LandmarkName::LeftKnee => "left_knee",
            LandmarkName::RightKnee => "right_knee",
            LandmarkName::LeftAnkle => "left_ankle",
            LandmarkName::RightAnkle => "right_ankle",
            LandmarkName::LeftHeel => "left_heel",
            LandmarkName::RightHeel => "right_heel",
            LandmarkName::LeftFootIndex => "left_foot_index",
            LandmarkName::RightFootIndex => "right_foot_index",
        }
    }

    /// Knees, ankles, heels and feet. Some deployments strip these from the
    /// caller-facing keypoints.
    pub fn is_lower_body(self) -> bool {
        matches!(
            self,
            LandmarkName::LeftKnee
                | LandmarkName::RightKnee
                | LandmarkName::LeftAnkle
                | LandmarkName::RightAnkle
                | LandmarkName::LeftHeel
                | LandmarkName::RightHeel
                | LandmarkName::LeftFootIndex
                | LandmarkName::RightFootIndex
        )
    }
}

impl fmt::Display for LandmarkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a string outside the landmark vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown landmark name: {0}")]
pub struct UnknownLandmark(pub String);

impl FromStr for LandmarkName {
    type Err = UnknownLandmark;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownLandmark(s.to_string()))
    }
}

/// A detected point in image pixel space (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: i32,
    pub y: i32,
    /// Relative depth on the detector's own scale. Passed through untouched.
    pub z: f32,
    /// Detector confidence in [0, 1] that the point is actually visible.
    pub visibility: f32,
}

impl Landmark {
    pub const fn new(x: i32, y: i32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }
}

/// All landmarks detected for a single pose, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: BTreeMap<LandmarkName, Landmark>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from detector output in normalized `[0, 1]` coordinates.
    ///
    /// Each entry is `(name, nx, ny, z, visibility)`; pixel coordinates are
    /// truncated toward zero.
    pub fn from_normalized<I>(points: I, width: u32, height: u32) -> Self
    where
        I: IntoIterator<Item = (LandmarkName, f32, f32, f32, f32)>,
    {
        let points = points
            .into_iter()
            .map(|(name, nx, ny, z, visibility)| {
                let x = (nx * width as f32) as i32;
                let y = (ny * height as f32) as i32;
                (name, Landmark::new(x, y, z, visibility))
            })
            .collect();
        Self { points }
    }

    /// Insert or replace a landmark. Returns the previous entry for `name`.
    pub fn insert(&mut self, name: LandmarkName, landmark: Landmark) -> Option<Landmark> {
        self.points.insert(name, landmark)
    }

    pub fn get(&self, name: LandmarkName) -> Option<&Landmark> {
        self.points.get(&name)
    }

    pub fn contains(&self, name: LandmarkName) -> bool {
        self.points.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A copy of this set with knee/ankle/heel/foot points removed.
    pub fn without_lower_body(&self) -> Self {
        let points = self
            .points
            .iter()
            .filter(|(name, _)| !name.is_lower_body())
            .map(|(name, lm)| (*name, *lm))
            .collect();
        Self { points }
    }
}

impl FromIterator<(LandmarkName, Landmark)> for LandmarkSet {
    fn from_iter<T: IntoIterator<Item = (LandmarkName, Landmark)>>(iter: T) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
