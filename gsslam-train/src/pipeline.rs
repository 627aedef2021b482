//! Training-step orchestration
//!
//! [`SlamPipeline`] owns the scene, the frame stream, the tracker, the window
//! scheduler and the phase alternator, and exposes the hooks an external
//! trainer calls around each optimizer step:
//!
//! 1. [`SlamPipeline::before_train_iteration`] flips the mode,
//! 2. [`SlamPipeline::compute_loss_and_metrics`] samples a frame, corrects its
//!    pose and renders it,
//! 3. the trainer steps the groups from [`SlamPipeline::trainable_parameter_groups`],
//! 4. [`SlamPipeline::after_train_iteration`] refines the scene in mapping mode.

use crate::config::{ConfigError, SamplingPolicy, SlamConfig};
use crate::covisibility::CovisibilityScorer;
use crate::ingest::{Frame, FrameStream, StreamError};
use crate::mode::{Mode, PhaseAlternator};
use crate::scene::{LossDict, MetricsDict, ParamGroups, RefineOutcome, SceneError, SceneModel};
use crate::tracker::{Tracker, TrackerError};
use crate::window::{FrameScheduler, SchedulerError};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Everything one training step produced.
#[derive(Debug, Clone)]
pub struct StepOutput<O> {
    pub step: u64,
    pub mode: Mode,
    /// The frame that was rendered.
    pub frame: Arc<Frame>,
    pub outputs: O,
    pub losses: LossDict,
    pub metrics: MetricsDict,
}

impl<O> StepOutput<O> {
    /// Sum of all loss terms.
    pub fn total_loss(&self) -> f32 {
        self.losses.values().sum()
    }
}

/// SLAM training loop over a scene model and a frame stream.
pub struct SlamPipeline<S, D> {
    config: SlamConfig,
    scene: S,
    stream: D,
    tracker: Tracker,
    scheduler: FrameScheduler,
    alternator: PhaseAlternator,
    current: Option<Arc<Frame>>,
}

impl<S: SceneModel, D: FrameStream> SlamPipeline<S, D> {
    pub fn new(config: SlamConfig, scene: S, stream: D) -> Result<Self, PipelineError> {
        config.validate()?;
        let tracker = Tracker::setup(config.tracker.clone(), stream.num_cameras());
        let scheduler = FrameScheduler::new(config.scheduler.clone());
        let alternator = PhaseAlternator::new(&config.mode);
        info!(
            "Pipeline ready: {} cameras, {} primitives, window {:?}, starting in {} mode",
            tracker.num_cameras(),
            scene.num_primitives(),
            config.scheduler.max_window,
            alternator.mode()
        );
        Ok(Self {
            config,
            scene,
            stream,
            tracker,
            scheduler,
            alternator,
            current: None,
        })
    }

    pub fn config(&self) -> &SlamConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.alternator.mode()
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut Tracker {
        &mut self.tracker
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn stream(&self) -> &D {
        &self.stream
    }

    /// Pre-iteration hook. Returns the mode of the coming step.
    pub fn before_train_iteration(&mut self, step: u64) -> Mode {
        self.alternator.on_pre_iteration(step)
    }

    /// Frame to train on at `step`.
    pub fn get_next_training_sample(&mut self, step: u64) -> Result<Arc<Frame>, PipelineError> {
        if self.config.reuse_frame_across_phases && self.mode() == Mode::Mapping {
            if let Some(frame) = &self.current {
                return Ok(Arc::clone(frame));
            }
        }

        let frame = match self.config.sampling {
            SamplingPolicy::Windowed => {
                let measure = CovisibilityScorer::new(&self.scene, step);
                self.scheduler.next_frame(step, &mut self.stream, &measure)?
            }
            SamplingPolicy::Fresh => self
                .stream
                .next_frame(step)?
                .ok_or(SchedulerError::StreamExhausted { attempts: 0 })?,
        };
        self.current = Some(Arc::clone(&frame));
        Ok(frame)
    }

    /// Sample, pose-correct, render and score one frame.
    #[tracing::instrument(skip_all, fields(step = step, mode = %self.mode()))]
    pub fn compute_loss_and_metrics(&mut self, step: u64) -> Result<StepOutput<S::Output>, PipelineError> {
        self.run_step(step).inspect_err(|e| {
            error!("Training step {} failed: {}", step, e);
        })
    }

    fn run_step(&mut self, step: u64) -> Result<StepOutput<S::Output>, PipelineError> {
        let frame = self.get_next_training_sample(step)?;
        let camera = self.tracker.apply_to_camera(&frame.camera)?;
        let outputs = self.scene.render(&camera, step)?;

        let mut metrics = self.scene.metrics(&outputs, &frame);
        metrics.extend(self.tracker.metric_terms());
        let mut losses = self.scene.losses(&outputs, &frame, &metrics);
        losses.extend(self.tracker.loss_terms());

        let output = StepOutput {
            step,
            mode: self.mode(),
            frame,
            outputs,
            losses,
            metrics,
        };
        debug!(
            "Step {} ({}): frame {}, loss {:.5}",
            step,
            output.mode,
            output.frame.index(),
            output.total_loss()
        );
        Ok(output)
    }

    /// Groups the optimizer may update this step.
    ///
    /// Tracking exposes only the pose corrections, mapping only the scene.
    pub fn trainable_parameter_groups(&self) -> ParamGroups {
        let mode = self.mode();
        let mut groups = ParamGroups::new();
        if mode.reports_tracker() {
            groups.extend(self.tracker.param_groups());
        }
        if mode.reports_scene() {
            groups.extend(self.scene.parameter_groups());
        }
        groups
    }

    /// Post-iteration hook: scene refinement, mapping steps only.
    pub fn after_train_iteration(&mut self, step: u64) -> RefineOutcome {
        if !self.mode().runs_refinement() {
            return RefineOutcome::default();
        }
        let outcome = self.scene.refine(step);
        if outcome != RefineOutcome::default() {
            info!(
                "Step {}: refinement removed {} and added {} primitives ({} remain)",
                step,
                outcome.removed,
                outcome.added,
                self.scene.num_primitives()
            );
        }
        outcome
    }
}
