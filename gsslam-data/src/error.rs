//! Error type for data loading.

use thiserror::Error;

/// Errors raised while reading point clouds or dataset manifests.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PLY parsing error: {0}")]
    Ply(String),

    #[error("Manifest parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing property '{property}' at vertex {index}")]
    MissingProperty { property: &'static str, index: usize },

    #[error("Frame {index} has no {field} and the manifest provides no default")]
    MissingIntrinsic { index: usize, field: &'static str },

    #[error("Frame {index} has a degenerate transform matrix")]
    DegenerateTransform { index: usize },
}
