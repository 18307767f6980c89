//! Skin tone classification from a facial colour sample.
//!
//! The sample is the mean colour of a square patch centred between the eyes
//! and nose. That mean is mapped through three independent brightness
//! ladders plus a channel-ratio undertone test. This is a heuristic over one
//! averaged colour, not a calibrated measurement.

use serde::{Deserialize, Serialize};

use crate::landmarks::{LandmarkName, LandmarkSet};
use crate::pixels::{ChannelOrder, PixelBuffer, Region};
use crate::round_to;

/// Half-width in pixels of the sampled face patch.
pub const SAMPLE_HALF_WIDTH: i32 = 30;

/// Landmarks whose centroid anchors the face patch.
pub const FACE_LANDMARKS: [LandmarkName; 3] = [
    LandmarkName::Nose,
    LandmarkName::LeftEye,
    LandmarkName::RightEye,
];

const NO_FACE_LANDMARKS: &str = "no face landmarks for skin detection";
const EMPTY_REGION: &str = "empty region for skin color";

/// Fitzpatrick-like phototype bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitzpatrickScale {
    pub scale: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Undertone {
    Warm,
    Cool,
    Neutral,
}

impl Undertone {
    pub fn description(self) -> &'static str {
        match self {
            Undertone::Warm => "Golden, peach or yellow hues",
            Undertone::Cool => "Pink, red or bluish hues",
            Undertone::Neutral => "Balanced mix of warm and cool hues",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndertoneLabel {
    pub tone: Undertone,
    pub description: String,
}

/// A classified skin colour sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinTone {
    /// Lowercase `#rrggbb` of the truncated mean colour.
    pub hex: String,
    pub rgb: [u8; 3],
    /// Mean of the three channel means, rounded to two decimals.
    pub brightness: f64,
    pub tone_category: String,
    pub skin_category: String,
    pub fitzpatrick: FitzpatrickScale,
    pub undertone: UndertoneLabel,
}

/// Either a classified sample or the reason none could be taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkinToneResult {
    Error { error: String },
    Sampled(SkinTone),
}

impl SkinToneResult {
    pub fn error(message: impl Into<String>) -> Self {
        SkinToneResult::Error {
            error: message.into(),
        }
    }

    pub fn tone(&self) -> Option<&SkinTone> {
        match self {
            SkinToneResult::Sampled(t) => Some(t),
            SkinToneResult::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SkinToneResult::Error { error } => Some(error),
            SkinToneResult::Sampled(_) => None,
        }
    }
}

/// Classify the skin tone around the face landmarks of `landmarks`.
///
/// Never fails: missing landmarks, an empty patch and sampling faults all
/// come back as [`SkinToneResult::Error`].
pub fn classify(landmarks: &LandmarkSet, pixels: &PixelBuffer<'_>) -> SkinToneResult {
    let face_points: Vec<(i32, i32)> = FACE_LANDMARKS
        .iter()
        .filter_map(|name| landmarks.get(*name))
        .map(|lm| (lm.x, lm.y))
        .collect();

    let Some((cx, cy)) = centroid(&face_points) else {
        return SkinToneResult::error(NO_FACE_LANDMARKS);
    };

    let region = Region::around(cx, cy, SAMPLE_HALF_WIDTH, pixels.width(), pixels.height());
    if region.is_empty() {
        tracing::debug!(cx, cy, "skin tone: sample region empty after clamping");
        return SkinToneResult::error(EMPTY_REGION);
    }

    match pixels.mean_rgb(&region) {
        Ok(mean) => {
            tracing::debug!(
                x0 = region.x0,
                y0 = region.y0,
                x1 = region.x1,
                y1 = region.y1,
                "skin tone: region sampled"
            );
            SkinToneResult::Sampled(classify_color(mean))
        }
        Err(e) => {
            tracing::warn!(error = %e, "skin tone: sampling failed");
            SkinToneResult::error(format!("skin extraction failed: {e}"))
        }
    }
}

/// Classify straight from a raw pixel buffer in any supported channel order.
///
/// A buffer whose length does not match `width × height` is reported as a
/// failed extraction rather than an error.
pub fn classify_buffer(
    landmarks: &LandmarkSet,
    data: &[u8],
    width: u32,
    height: u32,
    order: ChannelOrder,
) -> SkinToneResult {
    match PixelBuffer::new(data, width, height, order) {
        Ok(pixels) => classify(landmarks, &pixels),
        Err(e) => {
            tracing::warn!(error = %e, "skin tone: rejected pixel buffer");
            SkinToneResult::error(format!("skin extraction failed: {e}"))
        }
    }
}

/// Classify a mean `[r, g, b]` colour.
pub fn classify_color(mean: [f64; 3]) -> SkinTone {
    let [r, g, b] = mean;
    let rgb = [truncate_channel(r), truncate_channel(g), truncate_channel(b)];
    let brightness = (r + g + b) / 3.0;
    let undertone = undertone(r, g, b);

    SkinTone {
        hex: hex_color(rgb),
        rgb,
        brightness: round_to(brightness, 2),
        tone_category: simple_tone(brightness).to_string(),
        skin_category: descriptive_category(brightness).to_string(),
        fitzpatrick: {
            let (scale, description) = fitzpatrick(brightness);
            FitzpatrickScale {
                scale: scale.to_string(),
                description: description.to_string(),
            }
        },
        undertone: UndertoneLabel {
            tone: undertone,
            description: undertone.description().to_string(),
        },
    }
}

/// Lowercase, zero-padded `#rrggbb`.
pub fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Nine-step plain-language tone.
pub fn simple_tone(brightness: f64) -> &'static str {
    if brightness > 220.0 {
        "Very Light"
    } else if brightness > 200.0 {
        "Light"
    } else if brightness > 180.0 {
        "Light Medium"
    } else if brightness > 160.0 {
        "Medium"
    } else if brightness > 140.0 {
        "Medium Tan"
    } else if brightness > 120.0 {
        "Tan"
    } else if brightness > 100.0 {
        "Medium Dark"
    } else if brightness > 80.0 {
        "Dark"
    } else {
        "Very Dark"
    }
}

/// Ten-step shade name in the style of cosmetic ranges.
pub fn descriptive_category(brightness: f64) -> &'static str {
    if brightness > 230.0 {
        "Porcelain"
    } else if brightness > 210.0 {
        "Ivory"
    } else if brightness > 190.0 {
        "Beige"
    } else if brightness > 170.0 {
        "Sand"
    } else if brightness > 150.0 {
        "Honey"
    } else if brightness > 130.0 {
        "Caramel"
    } else if brightness > 110.0 {
        "Bronze"
    } else if brightness > 90.0 {
        "Mocha"
    } else if brightness > 70.0 {
        "Espresso"
    } else {
        "Ebony"
    }
}

/// Fitzpatrick-like phototype `(scale, description)`.
pub fn fitzpatrick(brightness: f64) -> (&'static str, &'static str) {
    if brightness > 210.0 {
        ("Type I", "Very fair; always burns, never tans")
    } else if brightness > 190.0 {
        ("Type II", "Fair; usually burns, tans minimally")
    } else if brightness > 160.0 {
        ("Type III", "Medium; sometimes burns, tans uniformly")
    } else if brightness > 130.0 {
        ("Type IV", "Olive; rarely burns, tans easily")
    } else if brightness > 100.0 {
        ("Type V", "Brown; very rarely burns, tans darkly")
    } else {
        ("Type VI", "Deeply pigmented; never burns")
    }
}

/// Warm/cool/neutral from channel ratios. Zero denominators count as a
/// ratio of 1.
pub fn undertone(r: f64, g: f64, b: f64) -> Undertone {
    let yellow_factor = if b == 0.0 { 1.0 } else { (r + g) / (2.0 * b) };
    let red_factor = if g == 0.0 { 1.0 } else { r / g };
    let blue_factor = if r == 0.0 { 1.0 } else { b / r };

    if yellow_factor > 1.15 && red_factor > 1.1 {
        Undertone::Warm
    } else if yellow_factor < 0.95 && blue_factor > 0.85 {
        Undertone::Cool
    } else {
        Undertone::Neutral
    }
}

/// Integer mean of the face points, truncated toward zero.
fn centroid(points: &[(i32, i32)]) -> Option<(i32, i32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as i64;
    let sx: i64 = points.iter().map(|p| i64::from(p.0)).sum();
    let sy: i64 = points.iter().map(|p| i64::from(p.1)).sum();
    Some(((sx / n) as i32, (sy / n) as i32))
}

fn truncate_channel(v: f64) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;
    use image::{Rgb, RgbImage};

    fn face_at(x: i32, y: i32) -> LandmarkSet {
        [
            (LandmarkName::Nose, Landmark::new(x, y + 10, 0.0, 0.99)),
            (LandmarkName::LeftEye, Landmark::new(x + 10, y - 5, 0.0, 0.99)),
            (LandmarkName::RightEye, Landmark::new(x - 10, y - 5, 0.0, 0.99)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_no_face_landmarks() {
        let img = RgbImage::new(100, 100);
        let set: LandmarkSet = [(LandmarkName::LeftHip, Landmark::new(50, 50, 0.0, 1.0))]
            .into_iter()
            .collect();
        let result = classify(&set, &PixelBuffer::from_rgb(&img));
        assert_eq!(result.error_message(), Some(NO_FACE_LANDMARKS));
    }

    #[test]
    fn test_empty_region_when_face_off_image() {
        let img = RgbImage::new(100, 100);
        let set = face_at(500, 500);
        let result = classify(&set, &PixelBuffer::from_rgb(&img));
        assert_eq!(result.error_message(), Some(EMPTY_REGION));
    }

    #[test]
    fn test_uniform_patch() {
        let img = RgbImage::from_pixel(200, 200, Rgb([224, 172, 105]));
        let result = classify(&face_at(100, 100), &PixelBuffer::from_rgb(&img));
        let tone = result.tone().unwrap();
        assert_eq!(tone.hex, "#e0ac69");
        assert_eq!(tone.rgb, [224, 172, 105]);
        assert_eq!(tone.brightness, 167.0);
        assert_eq!(tone.tone_category, "Medium");
        assert_eq!(tone.skin_category, "Honey");
        assert_eq!(tone.fitzpatrick.scale, "Type III");
        assert_eq!(tone.undertone.tone, Undertone::Warm);
    }

    #[test]
    fn test_bgr_source_is_converted() {
        // Same colour as above, stored blue-first
        let w = 80u32;
        let h = 80u32;
        let data: Vec<u8> = (0..w * h).flat_map(|_| [105u8, 172, 224]).collect();
        let buf = PixelBuffer::new(&data, w, h, ChannelOrder::Bgr).unwrap();
        let tone = classify(&face_at(40, 40), &buf).tone().cloned().unwrap();
        assert_eq!(tone.rgb, [224, 172, 105]);
        assert_eq!(tone.undertone.tone, Undertone::Warm);
    }

    #[test]
    fn test_malformed_buffer_reports_extraction_failure() {
        let data = vec![0u8; 100];
        let result = classify_buffer(&face_at(5, 5), &data, 10, 10, ChannelOrder::Bgr);
        let msg = result.error_message().unwrap();
        assert!(msg.starts_with("skin extraction failed: "), "{msg}");
    }

    #[test]
    fn test_classify_buffer_accepts_bgra() {
        let data: Vec<u8> = (0..64 * 64).flat_map(|_| [105u8, 172, 224, 255]).collect();
        let result = classify_buffer(&face_at(32, 32), &data, 64, 64, ChannelOrder::Bgra);
        assert_eq!(result.tone().map(|t| t.rgb), Some([224, 172, 105]));
    }

    #[test]
    fn test_patch_uses_only_face_region() {
        // Face patch is 60x60 around (100,100); everything else is black
        let img = RgbImage::from_fn(300, 300, |x, y| {
            if (70..130).contains(&x) && (70..130).contains(&y) {
                Rgb([90, 60, 40])
            } else {
                Rgb([0, 0, 0])
            }
        });
        // Centroid of (100,110), (110,95), (90,95) = (100, 100)
        let tone = classify(&face_at(100, 100), &PixelBuffer::from_rgb(&img))
            .tone()
            .cloned()
            .unwrap();
        assert_eq!(tone.rgb, [90, 60, 40]);
    }

    #[test]
    fn test_single_face_landmark_is_enough() {
        let img = RgbImage::from_pixel(50, 50, Rgb([240, 235, 230]));
        let set: LandmarkSet = [(LandmarkName::RightEye, Landmark::new(2, 2, 0.0, 0.2))]
            .into_iter()
            .collect();
        let tone = classify(&set, &PixelBuffer::from_rgb(&img))
            .tone()
            .cloned()
            .unwrap();
        assert_eq!(tone.tone_category, "Very Light");
        assert_eq!(tone.skin_category, "Porcelain");
        assert_eq!(tone.fitzpatrick.scale, "Type I");
    }

    #[test]
    fn test_hex_is_lowercase_and_padded() {
        assert_eq!(hex_color([0, 10, 255]), "#000aff");
        assert_eq!(hex_color([171, 205, 239]), "#abcdef");
    }

    #[test]
    fn test_hex_matches_rgb_for_truncated_means() {
        let tone = classify_color([12.9, 200.5, 7.99]);
        assert_eq!(tone.rgb, [12, 200, 7]);
        assert_eq!(tone.hex, hex_color(tone.rgb));
        assert_eq!(tone.hex, "#0cc807");
    }

    #[test]
    fn test_ladders_are_monotonic_and_exhaustive() {
        const SIMPLE: [&str; 9] = [
            "Very Dark", "Dark", "Medium Dark", "Tan", "Medium Tan", "Medium", "Light Medium",
            "Light", "Very Light",
        ];
        const DESCRIPTIVE: [&str; 10] = [
            "Ebony", "Espresso", "Mocha", "Bronze", "Caramel", "Honey", "Sand", "Beige", "Ivory",
            "Porcelain",
        ];
        const FITZ: [&str; 6] = ["Type VI", "Type V", "Type IV", "Type III", "Type II", "Type I"];

        let rank = |labels: &[&str], label: &str| labels.iter().position(|l| *l == label);

        let mut prev = (0, 0, 0);
        for step in 0..=2550 {
            let b = f64::from(step) / 10.0;
            let s = rank(&SIMPLE, simple_tone(b)).unwrap();
            let d = rank(&DESCRIPTIVE, descriptive_category(b)).unwrap();
            let f = rank(&FITZ, fitzpatrick(b).0).unwrap();
            assert!(s >= prev.0 && d >= prev.1 && f >= prev.2, "non-monotonic at {b}");
            prev = (s, d, f);
        }
        // Both ends reached
        assert_eq!(prev, (SIMPLE.len() - 1, DESCRIPTIVE.len() - 1, FITZ.len() - 1));
        assert_eq!(simple_tone(0.0), "Very Dark");
    }

    #[test]
    fn test_ladder_breakpoints_are_exclusive() {
        assert_eq!(simple_tone(220.0), "Light");
        assert_eq!(simple_tone(220.01), "Very Light");
        assert_eq!(simple_tone(80.0), "Very Dark");
        assert_eq!(descriptive_category(230.0), "Ivory");
        assert_eq!(descriptive_category(70.0), "Ebony");
        assert_eq!(fitzpatrick(210.0).0, "Type II");
        assert_eq!(fitzpatrick(100.0).0, "Type VI");
    }

    #[test]
    fn test_ladders_are_independent() {
        // 185 sits in different relative positions on each ladder
        assert_eq!(simple_tone(185.0), "Light Medium");
        assert_eq!(descriptive_category(185.0), "Sand");
        assert_eq!(fitzpatrick(185.0).0, "Type III");
    }

    #[test]
    fn test_undertone_rules() {
        assert_eq!(undertone(224.0, 172.0, 105.0), Undertone::Warm);
        // Blue-heavy, b/r > 0.85
        assert_eq!(undertone(150.0, 140.0, 180.0), Undertone::Cool);
        assert_eq!(undertone(180.0, 170.0, 165.0), Undertone::Neutral);
    }

    #[test]
    fn test_undertone_zero_channels() {
        // b == 0 → yellow factor 1.0, not warm
        assert_eq!(undertone(200.0, 100.0, 0.0), Undertone::Neutral);
        // all zero: yellow 1, red 1, blue 1
        assert_eq!(undertone(0.0, 0.0, 0.0), Undertone::Neutral);
        // r == 0, g == 0 → yellow 0 < 0.95, b/r guarded to 1 > 0.85
        assert_eq!(undertone(0.0, 0.0, 50.0), Undertone::Cool);
    }

    #[test]
    fn test_centroid_truncates() {
        assert_eq!(centroid(&[(0, 0), (1, 1)]), Some((0, 0)));
        assert_eq!(centroid(&[(10, 20), (11, 21), (13, 23)]), Some((11, 21)));
        assert_eq!(centroid(&[]), None);
    }

    #[test]
    fn test_serialized_shapes_are_exclusive() {
        let ok = serde_json::to_value(classify_color([224.0, 172.0, 105.0])).unwrap();
        assert!(ok.get("error").is_none());
        assert_eq!(ok["fitzpatrick"]["scale"], "Type III");
        assert_eq!(ok["undertone"]["tone"], "Warm");

        let err = serde_json::to_value(SkinToneResult::error(EMPTY_REGION)).unwrap();
        assert_eq!(err, serde_json::json!({ "error": EMPTY_REGION }));
    }
}
