//! Derived body metrics from a single detected pose.
//!
//! Given the landmarks of one person and the pixels they were detected in,
//! this crate computes body proportions ([`geometry`]), a detection-quality
//! score ([`confidence`]) and a skin-tone classification ([`skin_tone`]), and
//! assembles them into one serializable [`AnalysisReport`].
//!
//! Pose detection itself sits behind the [`PoseDetector`] trait; the
//! ONNX-backed [`MoveNetDetector`] is one implementation.

pub mod confidence;
pub mod detector;
pub mod geometry;
pub mod landmarks;
pub mod pixels;
pub mod report;
pub mod skin_tone;

use std::path::PathBuf;

pub use confidence::{ConfidenceLevel, ConfidenceResult};
pub use detector::{DetectorError, MoveNetDetector, PoseDetector};
pub use geometry::{BodyMeasurements, BodyShape, BodyWidthResult};
pub use landmarks::{Landmark, LandmarkName, LandmarkSet};
pub use pixels::{ChannelOrder, PixelBuffer, Region, SamplingError};
pub use report::{analyze, AnalysisReport, ReportOptions};
pub use skin_tone::{SkinTone, SkinToneResult, Undertone};

/// File name of the default pose model inside the model directory.
pub const DEFAULT_MODEL_FILE: &str = "movenet_singlepose_lightning.onnx";

/// Determine the model directory.
///
/// When running as root (UID 0), defaults to `/var/lib/physique/models`.
/// Otherwise defaults to `$XDG_DATA_HOME/physique/models`
/// (~/.local/share/physique/models).
pub fn default_model_dir() -> PathBuf {
    if is_root() {
        PathBuf::from("/var/lib/physique/models")
    } else {
        let data_home = std::env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.local/share")
        });
        PathBuf::from(data_home).join("physique/models")
    }
}

fn is_root() -> bool {
    // SAFETY: geteuid is always safe to call.
    unsafe { libc::geteuid() == 0 }
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
