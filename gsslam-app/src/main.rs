//! gsslam
//!
//! Runs the Gaussian splatting SLAM training loop on a nerfstudio-style
//! dataset or on a generated orbit, and reports what the window scheduler
//! and the tracking / mapping alternation did.

mod app;
mod error;
mod synthetic;

use app::{AppBuilder, DataSource, LoggingConfig};
use clap::Parser;
use std::path::PathBuf;
use synthetic::SyntheticConfig;

/// gsslam - Covisibility-windowed Gaussian splatting SLAM
#[derive(Parser, Debug)]
#[command(name = "gsslam")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON run configuration (missing fields use defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// nerfstudio transforms.json to train on; a synthetic orbit is used when omitted
    #[arg(short, long)]
    transforms: Option<PathBuf>,

    /// Number of training steps
    #[arg(short, long, default_value_t = 200)]
    steps: u64,

    /// Steps between progress lines
    #[arg(long, default_value_t = 50)]
    log_every: u64,

    /// Frames in the synthetic orbit
    #[arg(long, default_value_t = 24)]
    frames: usize,

    /// Override the window capacity
    #[arg(long)]
    max_window: Option<usize>,

    /// Override the covisibility rejection threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Send spans to Tracy (requires the `tracy` feature)
    #[arg(long)]
    tracy: bool,

    /// Write a JSON run summary here
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn build(args: Args) -> Result<AppBuilder, error::AppError> {
    let mut config = match &args.config {
        Some(path) => app::load_config(path)?,
        None => app::default_run_config(),
    };
    if let Some(max_window) = args.max_window {
        config.scheduler.max_window = Some(max_window);
    }
    if let Some(threshold) = args.threshold {
        config.scheduler.covisibility_threshold = threshold;
    }
    config.validate()?;

    let source = match args.transforms {
        Some(path) => DataSource::Manifest(path),
        None => DataSource::Synthetic(SyntheticConfig {
            num_frames: args.frames,
            ..SyntheticConfig::default()
        }),
    };

    let mut builder = AppBuilder::new()
        .with_config(config)
        .with_source(source)
        .with_steps(args.steps)
        .with_log_every(args.log_every)
        .with_logging(LoggingConfig {
            level: args.log_level,
            enable_tracy: args.tracy,
        });
    if let Some(path) = args.summary {
        builder = builder.with_summary_path(path);
    }
    Ok(builder)
}

fn main() {
    let args = Args::parse();

    if let Err(e) = build(args).and_then(AppBuilder::run) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
