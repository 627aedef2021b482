use crate::ingest::Frame;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded FIFO of training frames.
///
/// Frames enter at the tail and leave from the head. With a capacity the
/// window never holds more than that many frames; without one it grows
/// without bound.
#[derive(Debug, Clone, Default)]
pub struct FrameWindow {
    frames: VecDeque<Arc<Frame>>,
    capacity: Option<usize>,
}

impl FrameWindow {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.unwrap_or_default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True once the window holds `capacity` frames. Unbounded windows are never full.
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.frames.len() >= cap)
    }

    /// Append at the tail, evicting from the head if the window is full.
    ///
    /// Returns the evicted frame.
    pub fn push(&mut self, frame: Arc<Frame>) -> Option<Arc<Frame>> {
        let evicted = if self.is_full() {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Frame>> {
        self.frames.iter()
    }

    /// Camera indices from head to tail.
    pub fn indices(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.index()).collect()
    }
}
