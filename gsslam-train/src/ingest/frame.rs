//! Observed camera views

use gsslam_data::Camera;
use image::RgbImage;

/// One observed view: the camera it was captured with and its image.
///
/// Frames are immutable once captured. Streams hand them out as
/// `Arc<Frame>` so the window can hold on to them without copying pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    pub camera: Camera,
    /// Ground-truth RGB image at the camera's full resolution.
    pub image: RgbImage,
}

impl Frame {
    pub fn new(camera: Camera, image: RgbImage) -> Self {
        Self { camera, image }
    }

    /// Frame with a blank image of the camera's size.
    pub fn blank(camera: Camera) -> Self {
        let image = RgbImage::new(camera.width(), camera.height());
        Self { camera, image }
    }

    /// Dataset index of the camera. Frames are identified by it.
    pub fn index(&self) -> usize {
        self.camera.index
    }

    /// Get image dimensions (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
