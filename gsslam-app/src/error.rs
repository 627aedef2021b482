use gsslam_data::DataError;
use gsslam_train::scene::SceneError;
use gsslam_train::{ConfigError, PipelineError, StreamError};
use std::path::PathBuf;

/// Errors surfaced by the `gsslam` binary
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Dataset error: {0}")]
    Data(#[from] DataError),
    #[error("Frame loading error: {0}")]
    Stream(#[from] StreamError),
    #[error("Render error: {0}")]
    Scene(#[from] SceneError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Training failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("Scene has no seed points")]
    NoSeedPoints,
}
