//! Loading manifest datasets into memory

use crate::ingest::{DatasetStream, Frame, StreamError};
use gsslam_data::Manifest;
use std::sync::Arc;
use tracing::{debug, info};

/// Decode every image listed in `manifest` and build a stream over them.
///
/// Images must match the size declared by their camera intrinsics.
#[tracing::instrument(skip_all, fields(frames = manifest.len()))]
pub fn load_dataset(manifest: &Manifest) -> Result<DatasetStream, StreamError> {
    let frames = manifest
        .frames
        .iter()
        .map(|entry| {
            let image = image::open(&entry.image_path)?.to_rgb8();
            let expected = (entry.camera.width(), entry.camera.height());
            if image.dimensions() != expected {
                return Err(StreamError::InvalidData(format!(
                    "{} is {}x{}, camera {} expects {}x{}",
                    entry.image_path.display(),
                    image.width(),
                    image.height(),
                    entry.camera.index,
                    expected.0,
                    expected.1
                )));
            }
            debug!("Loaded {}", entry.image_path.display());
            Ok(Arc::new(Frame::new(entry.camera, image)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!("Dataset loaded: {} frames", frames.len());
    DatasetStream::new(frames)
}
