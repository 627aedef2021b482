use crate::covisibility::CovisibilityMeasure;
use crate::ingest::{Frame, FrameStream, StreamError};
use crate::window::FrameWindow;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do once `max_attempts` candidates in a row were rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryLimitPolicy {
    /// Fail the call with [`SchedulerError::StreamExhausted`].
    #[default]
    Fail,
    /// Admit the candidate with the lowest maximum covisibility seen so far.
    AdmitLeastCovisible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Window capacity; `None` keeps every admitted frame.
    pub max_window: Option<usize>,
    /// Candidates whose maximum covisibility with the window reaches this value
    /// are rejected. At 1.0 nothing is rejected.
    pub covisibility_threshold: f32,
    /// Rejected candidates allowed per call.
    pub max_attempts: usize,
    pub on_retry_limit: RetryLimitPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_window: Some(10),
            covisibility_threshold: 0.6,
            max_attempts: 100,
            on_retry_limit: RetryLimitPolicy::Fail,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_window(mut self, max_window: Option<usize>) -> Self {
        self.max_window = max_window;
        self
    }

    pub fn with_covisibility_threshold(mut self, threshold: f32) -> Self {
        self.covisibility_threshold = threshold;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_retry_limit_policy(mut self, policy: RetryLimitPolicy) -> Self {
        self.on_retry_limit = policy;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("No admissible frame after {attempts} candidates")]
    StreamExhausted { attempts: usize },
    #[error("Frame stream failed: {0}")]
    Stream(#[from] StreamError),
}

/// Running totals over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub admitted: u64,
    pub rejected: u64,
    pub evicted: u64,
}

/// Sliding-window frame scheduler.
///
/// While the window is filling every frame is admitted. Once it is full a
/// candidate is admitted only if it is sufficiently novel: its maximum
/// covisibility with the frames in the window must stay below the threshold.
/// Admission then evicts the oldest frame.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    config: SchedulerConfig,
    window: FrameWindow,
    stats: SchedulerStats,
}

impl FrameScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            window: FrameWindow::new(config.max_window),
            config,
            stats: SchedulerStats::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn window(&self) -> &FrameWindow {
        &self.window
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Admit the next frame from `stream` and return it.
    #[tracing::instrument(skip_all, fields(step = step, window = self.window.len()))]
    pub fn next_frame<D, M>(
        &mut self,
        step: u64,
        stream: &mut D,
        measure: &M,
    ) -> Result<Arc<Frame>, SchedulerError>
    where
        D: FrameStream + ?Sized,
        M: CovisibilityMeasure + ?Sized,
    {
        if !self.window.is_full() || self.window.is_empty() {
            let frame = stream
                .next_frame(step)?
                .ok_or(SchedulerError::StreamExhausted { attempts: 0 })?;
            self.admit(Arc::clone(&frame));
            debug!("Filling window: admitted frame {} ({} held)", frame.index(), self.window.len());
            return Ok(frame);
        }

        let mut best: Option<(OrderedFloat<f32>, Arc<Frame>)> = None;
        let mut attempts = 0;
        while attempts < self.config.max_attempts {
            let Some(candidate) = stream.next_frame(step)? else {
                warn!("Frame stream ended after {} rejected candidates", attempts);
                return Err(SchedulerError::StreamExhausted { attempts });
            };

            let max_score = self.max_covisibility(&candidate, measure);
            if self.is_novel(max_score) {
                self.admit(Arc::clone(&candidate));
                debug!(
                    "Admitted frame {} (max covisibility {:.3}) after {} rejections",
                    candidate.index(),
                    max_score.0,
                    attempts
                );
                return Ok(candidate);
            }

            attempts += 1;
            self.stats.rejected += 1;
            debug!(
                "Rejected frame {} (max covisibility {:.3} >= {})",
                candidate.index(),
                max_score.0,
                self.config.covisibility_threshold
            );
            if best.as_ref().is_none_or(|(score, _)| max_score < *score) {
                best = Some((max_score, candidate));
            }
        }

        match (self.config.on_retry_limit, best) {
            (RetryLimitPolicy::AdmitLeastCovisible, Some((score, frame))) => {
                warn!(
                    "Retry limit of {} reached, admitting least covisible frame {} ({:.3})",
                    attempts,
                    frame.index(),
                    score.0
                );
                self.admit(Arc::clone(&frame));
                Ok(frame)
            }
            _ => {
                warn!("Retry limit of {} reached without an admissible frame", attempts);
                Err(SchedulerError::StreamExhausted { attempts })
            }
        }
    }

    /// A threshold of 1.0 or more admits every candidate, including exact duplicates.
    fn is_novel(&self, max_score: OrderedFloat<f32>) -> bool {
        let threshold = self.config.covisibility_threshold;
        threshold >= 1.0 || max_score.0 < threshold
    }

    fn max_covisibility<M>(&self, candidate: &Frame, measure: &M) -> OrderedFloat<f32>
    where
        M: CovisibilityMeasure + ?Sized,
    {
        self.window
            .iter()
            .map(|frame| OrderedFloat(measure.score(candidate, frame)))
            .max()
            .unwrap_or(OrderedFloat(0.0))
    }

    fn admit(&mut self, frame: Arc<Frame>) {
        if let Some(evicted) = self.window.push(frame) {
            self.stats.evicted += 1;
            debug!("Evicted frame {}", evicted.index());
        }
        self.stats.admitted += 1;
    }
}
