use std::time::Duration;

use physique_core::detector::DetectorError;
use physique_core::{AnalysisReport, PixelBuffer, PoseDetector, ReportOptions};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("analysis timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
struct AnalyzeRequest {
    id: Uuid,
    image: Vec<u8>,
    reply: oneshot::Sender<Result<AnalysisReport, EngineError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<AnalyzeRequest>,
}

impl EngineHandle {
    /// Decode `image`, detect a pose and derive the full report.
    ///
    /// The request stays queued on the engine thread after a timeout; only
    /// the caller stops waiting for it.
    pub async fn analyze(
        &self,
        id: Uuid,
        image: Vec<u8>,
        timeout: Duration,
    ) -> Result<AnalysisReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = async {
            self.tx
                .send(AnalyzeRequest {
                    id,
                    image,
                    reply: reply_tx,
                })
                .await
                .map_err(|_| EngineError::ChannelClosed)?;
            reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
        };

        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| EngineError::Timeout(timeout))?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns `detector` for its whole life and serves one request at a
/// time, so the detector needs no synchronisation.
pub fn spawn_engine(mut detector: Box<dyn PoseDetector>, options: ReportOptions) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<AnalyzeRequest>(4);

    std::thread::Builder::new()
        .name("physique-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                let span = tracing::info_span!("analyze", request_id = %req.id);
                let _guard = span.enter();
                let result = run_analysis(detector.as_mut(), &req.image, &options);
                if req.reply.send(result).is_err() {
                    tracing::debug!("caller went away before the result was ready");
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

fn run_analysis(
    detector: &mut dyn PoseDetector,
    bytes: &[u8],
    options: &ReportOptions,
) -> Result<AnalysisReport, EngineError> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        "image decoded"
    );

    let pose = detector.detect(&image)?;
    match &pose {
        Some(set) => tracing::debug!(landmarks = set.len(), "pose detected"),
        None => tracing::info!("no pose detected"),
    }

    let report = physique_core::analyze(pose.as_ref(), &PixelBuffer::from_rgb(&image), options);
    tracing::info!(
        confidence = report.model_accuracy.overall_confidence,
        "analysis complete"
    );
    Ok(report)
}
