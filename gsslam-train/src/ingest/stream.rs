//! Pull-based frame streams

use crate::ingest::Frame;
use std::sync::Arc;
use tracing::debug;

/// Source of training frames, pulled once per scheduler request.
///
/// This is the data manager side of the training loop. Implementations may be
/// infinite (cycling over a dataset) or finite. `Ok(None)` means the stream
/// cannot supply another frame.
pub trait FrameStream {
    /// Get the next frame for the given training step.
    fn next_frame(&mut self, step: u64) -> Result<Option<Arc<Frame>>, StreamError>;

    /// Number of distinct training cameras this stream can produce.
    /// Pose corrections are allocated per camera index in `0..num_cameras()`.
    fn num_cameras(&self) -> usize;
}

impl<S: FrameStream + ?Sized> FrameStream for &mut S {
    fn next_frame(&mut self, step: u64) -> Result<Option<Arc<Frame>>, StreamError> {
        (**self).next_frame(step)
    }

    fn num_cameras(&self) -> usize {
        (**self).num_cameras()
    }
}

/// Errors that can occur while producing frames
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decoding error: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Dataset error: {0}")]
    Data(#[from] gsslam_data::DataError),
    #[error("Dataset contains no frames")]
    EmptyDataset,
    #[error("Invalid frame data: {0}")]
    InvalidData(String),
}

/// Stream that walks a dataset in order and wraps around.
///
/// With a cycle limit the stream ends after that many full passes, which
/// makes exhaustion observable in tests and batch runs.
#[derive(Debug, Clone)]
pub struct DatasetStream {
    frames: Vec<Arc<Frame>>,
    cursor: usize,
    cycles: usize,
    max_cycles: Option<usize>,
}

impl DatasetStream {
    /// Create an endless stream over `frames`.
    pub fn new(frames: Vec<Arc<Frame>>) -> Result<Self, StreamError> {
        if frames.is_empty() {
            return Err(StreamError::EmptyDataset);
        }
        Ok(Self {
            frames,
            cursor: 0,
            cycles: 0,
            max_cycles: None,
        })
    }

    /// Create a stream from owned frames.
    pub fn from_frames(frames: impl IntoIterator<Item = Frame>) -> Result<Self, StreamError> {
        Self::new(frames.into_iter().map(Arc::new).collect())
    }

    /// Stop after `cycles` full passes over the dataset.
    pub fn with_max_cycles(mut self, cycles: usize) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Number of frames handed out so far.
    pub fn frames_served(&self) -> usize {
        self.cycles * self.frames.len() + self.cursor
    }

    /// Check if the stream can still produce frames
    pub fn is_active(&self) -> bool {
        self.max_cycles.is_none_or(|max| self.cycles < max)
    }
}

impl FrameStream for DatasetStream {
    fn next_frame(&mut self, step: u64) -> Result<Option<Arc<Frame>>, StreamError> {
        if !self.is_active() {
            return Ok(None);
        }

        let frame = Arc::clone(&self.frames[self.cursor]);
        self.cursor += 1;
        if self.cursor == self.frames.len() {
            self.cursor = 0;
            self.cycles += 1;
            debug!("Dataset pass {} complete at step {}", self.cycles, step);
        }
        Ok(Some(frame))
    }

    fn num_cameras(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat3, Vec3};
    use gsslam_data::{Camera, Intrinsics};

    fn frame(index: usize) -> Frame {
        Frame::blank(Camera::new(
            index,
            Mat3::IDENTITY,
            Vec3::ZERO,
            Intrinsics::centered(4.0, 4.0, 4, 4),
        ))
    }

    #[test]
    fn test_dataset_stream_cycles() {
        let mut stream = DatasetStream::from_frames((0..3).map(frame)).unwrap();
        let indices: Vec<usize> = (0..7)
            .map(|step| stream.next_frame(step).unwrap().unwrap().index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(stream.frames_served(), 7);
        assert_eq!(stream.num_cameras(), 3);
    }

    #[test]
    fn test_dataset_stream_cycle_limit() {
        let mut stream = DatasetStream::from_frames((0..2).map(frame))
            .unwrap()
            .with_max_cycles(1);
        assert!(stream.next_frame(0).unwrap().is_some());
        assert!(stream.next_frame(1).unwrap().is_some());
        assert!(!stream.is_active());
        assert!(stream.next_frame(2).unwrap().is_none());
        assert_eq!(stream.frames_served(), 2);
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let err = DatasetStream::from_frames(Vec::new()).unwrap_err();
        assert!(matches!(err, StreamError::EmptyDataset));
    }

    #[test]
    fn test_frames_are_shared_not_copied() {
        let mut stream = DatasetStream::from_frames((0..1).map(frame)).unwrap();
        let a = stream.next_frame(0).unwrap().unwrap();
        let b = stream.next_frame(1).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
