//! Training configuration

use crate::mode::ModeConfig;
use crate::scene::SceneConfig;
use crate::tracker::TrackerConfig;
use crate::window::SchedulerConfig;
use serde::{Deserialize, Serialize};

/// Where training frames come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingPolicy {
    /// Through the covisibility-gated sliding window.
    #[default]
    Windowed,
    /// Straight from the frame stream.
    Fresh,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_window must be at least 1 (use null for an unbounded window)")]
    ZeroWindow,
    #[error("covisibility_threshold must lie in [0, 1], got {0}")]
    ThresholdOutOfRange(f32),
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("mode.period must be at least 1")]
    ZeroPeriod,
    #[error("tracker penalty {name} must be finite and non-negative, got {value}")]
    InvalidPenalty { name: &'static str, value: f32 },
}

/// Full configuration of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlamConfig {
    pub tracker: TrackerConfig,
    pub scheduler: SchedulerConfig,
    pub mode: ModeConfig,
    pub scene: SceneConfig,
    pub sampling: SamplingPolicy,
    /// Pull a new frame only on tracking steps; mapping steps reuse it.
    pub reuse_frame_across_phases: bool,
}

impl SlamConfig {
    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_mode(mut self, mode: ModeConfig) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_scene(mut self, scene: SceneConfig) -> Self {
        self.scene = scene;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingPolicy) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_frame_reuse(mut self, reuse: bool) -> Self {
        self.reuse_frame_across_phases = reuse;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheduler = &self.scheduler;
        if scheduler.max_window == Some(0) {
            return Err(ConfigError::ZeroWindow);
        }
        if !(0.0..=1.0).contains(&scheduler.covisibility_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(scheduler.covisibility_threshold));
        }
        if scheduler.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.mode.period == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        for (name, value) in [
            ("trans_l2_penalty", self.tracker.trans_l2_penalty),
            ("rot_l2_penalty", self.tracker.rot_l2_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidPenalty { name, value });
            }
        }
        Ok(())
    }
}
