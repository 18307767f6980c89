use anyhow::{Context, Result};
use physique_core::MoveNetDetector;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "physiqued starting");

    let config = Config::load().context("failed to load configuration")?;

    // Fail fast: a missing or tampered model stops startup
    let model = config.model();
    model.verify().context("pose model check failed")?;
    if model.sha256.is_some() {
        tracing::info!(path = %model.path.display(), "pose model checksum verified");
    } else {
        tracing::warn!(
            path = %model.path.display(),
            "PHYSIQUE_MODEL_SHA256 not set; skipping checksum verification"
        );
    }

    let detector = MoveNetDetector::load(&model.path, config.min_pose_score)
        .context("failed to load pose model")?;
    tracing::info!(
        path = %model.path.display(),
        min_pose_score = config.min_pose_score,
        "pose model loaded"
    );

    let engine = engine::spawn_engine(Box::new(detector), config.report_options());
    let app = http::router(http::AppState::new(engine, &config), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "physiqued ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("physiqued shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
