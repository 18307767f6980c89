//! `physique`: offline pose-metrics analysis and model management.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod analyze;
mod setup;

#[derive(Parser, Debug)]
#[command(name = "physique")]
#[command(
    author,
    version,
    about = "Body geometry, skin tone and detection confidence from a photo",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze an image and print the JSON report
    Analyze(analyze::AnalyzeArgs),

    /// Download and verify the pose model
    Setup {
        /// Model download URL
        #[arg(long)]
        url: String,

        /// Expected SHA-256 of the model file (hex)
        #[arg(long)]
        sha256: String,

        /// Target directory (default: system or user model directory)
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// File name to store the model under
        #[arg(long, default_value = physique_core::DEFAULT_MODEL_FILE)]
        name: String,
    },

    /// Print the SHA-256 of a file
    Checksum {
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Analyze(args) => analyze::run(args),
        Commands::Setup {
            url,
            sha256,
            model_dir,
            name,
        } => setup::run(&url, &sha256, model_dir, &name),
        Commands::Checksum { path } => {
            let digest = physique_models::sha256_file_hex(&path)
                .with_context(|| format!("failed to hash {}", path.display()))?;
            println!("{digest}  {}", path.display());
            Ok(())
        }
    }
}
