//! Data ingestion module
//!
//! Provides the frame type the training loop consumes and the stream
//! abstraction the scheduler pulls candidates from:
//! - `Frame`: one camera plus its ground-truth image
//! - `FrameStream`: pull-based source of frames (the data manager)
//! - `DatasetStream`: cyclic stream over an in-memory dataset

pub mod dataset;
pub mod frame;
pub mod stream;

pub use dataset::load_dataset;
pub use frame::Frame;
pub use stream::{DatasetStream, FrameStream, StreamError};
