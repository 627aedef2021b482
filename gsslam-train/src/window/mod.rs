//! Sliding window of training frames and the covisibility-gated scheduler that fills it

mod frame_window;
mod scheduler;

pub use frame_window::FrameWindow;
pub use scheduler::{
    FrameScheduler, RetryLimitPolicy, SchedulerConfig, SchedulerError, SchedulerStats,
};
