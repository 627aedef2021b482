//! gsslam Training Crate
//!
//! Core of a Gaussian splatting SLAM training loop: frames are admitted into a
//! bounded sliding window when they add enough novel coverage, and training
//! alternates between tracking (refining per-camera pose corrections) and
//! mapping (refining the scene).
//!
//! ## Modules
//!
//! - [`ingest`]: Frames and the streams that produce them
//! - [`tracker`]: Per-camera pose corrections and their exp maps
//! - [`scene`]: Scene capability trait and the CPU reference Gaussian scene
//! - [`covisibility`]: Jaccard covisibility between two cameras
//! - [`window`]: Sliding frame window and covisibility-gated scheduler
//! - [`mode`]: Tracking / mapping alternation
//! - [`pipeline`]: Per-step orchestration and optimizer hooks
//! - [`config`]: Serializable run configuration

pub mod config;
pub mod covisibility;
pub mod ingest;
pub mod mode;
pub mod pipeline;
pub mod scene;
pub mod tracker;
pub mod window;

pub use config::{ConfigError, SamplingPolicy, SlamConfig};
pub use covisibility::{CovisibilityMeasure, CovisibilityScorer};
pub use ingest::{DatasetStream, Frame, FrameStream, StreamError};
pub use mode::{Mode, ModeConfig, PhaseAlternator};
pub use pipeline::{PipelineError, SlamPipeline, StepOutput};
pub use scene::{GaussianScene, SceneConfig, SceneModel};
pub use tracker::{Tracker, TrackerConfig, TrackerMode};
pub use window::{FrameScheduler, SchedulerConfig, SchedulerError};
