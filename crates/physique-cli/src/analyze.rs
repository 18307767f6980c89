//! `physique analyze`: run the full report over one image file.

use anyhow::{Context, Result};
use clap::Args;
use physique_core::detector::DEFAULT_MIN_POSE_SCORE;
use physique_core::{
    AnalysisReport, LandmarkSet, MoveNetDetector, PixelBuffer, PoseDetector, ReportOptions,
};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input image file
    pub image: PathBuf,

    /// Use landmarks from this JSON file instead of running the pose model
    #[arg(long)]
    pub landmarks: Option<PathBuf>,

    /// Pose model path (default: model directory + default model name)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Mean keypoint score below which no pose is reported
    #[arg(long, default_value_t = DEFAULT_MIN_POSE_SCORE)]
    pub min_pose_score: f32,

    /// Leave knees, ankles, heels and feet out of the returned keypoints
    #[arg(long)]
    pub exclude_lower_body: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let image = image::open(&args.image)
        .with_context(|| format!("failed to decode image {}", args.image.display()))?
        .to_rgb8();
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        "image decoded"
    );

    let pose = match &args.landmarks {
        Some(path) => read_landmarks(path)?,
        None => {
            let model_path = args.model.clone().unwrap_or_else(|| {
                physique_core::default_model_dir().join(physique_core::DEFAULT_MODEL_FILE)
            });
            let mut detector = MoveNetDetector::load(&model_path, args.min_pose_score)
                .context("failed to load pose model (run `physique setup` first?)")?;
            detector.detect(&image).context("pose detection failed")?
        }
    };

    let options = ReportOptions {
        exclude_lower_body: args.exclude_lower_body,
    };
    let report = physique_core::analyze(pose.as_ref(), &PixelBuffer::from_rgb(&image), &options);
    println!("{}", render(&report, args.pretty)?);
    Ok(())
}

/// Load a landmark map shaped like the report's `keypoints`.
///
/// An empty map is treated as "no pose detected".
fn read_landmarks(path: &Path) -> Result<Option<LandmarkSet>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let set: LandmarkSet = serde_json::from_str(&text)
        .with_context(|| format!("invalid landmark file {}", path.display()))?;
    Ok((!set.is_empty()).then_some(set))
}

fn render(report: &AnalysisReport, pretty: bool) -> Result<String> {
    let out = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    Ok(out)
}
