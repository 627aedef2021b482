use crate::error::AppError;
use crate::synthetic::{self, SyntheticConfig};
use gsslam_data::{Point, load_manifest, load_points_from_ply};
use gsslam_train::ingest::{DatasetStream, load_dataset};
use gsslam_train::scene::{GaussianInitializer, GaussianScene, LossDict, MetricsDict};
use gsslam_train::window::{RetryLimitPolicy, SchedulerStats};
use gsslam_train::{Mode, PipelineError, SchedulerError, SlamConfig, SlamPipeline};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// Where training frames and seed points come from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Generated orbit around a lattice of points.
    Synthetic(SyntheticConfig),
    /// nerfstudio `transforms.json`; seed points come from its `ply_file_path`.
    Manifest(PathBuf),
}

/// What a run did, written out as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub steps_run: u64,
    pub tracking_steps: u64,
    pub mapping_steps: u64,
    /// Set when the scheduler ran out of admissible frames before the last step.
    pub stopped_early: bool,
    pub final_losses: LossDict,
    pub final_metrics: MetricsDict,
    pub scheduler: SchedulerStats,
    /// Frames pulled from the stream, rejected candidates included.
    pub frames_served: usize,
    pub window: Vec<usize>,
    pub primitives: usize,
    pub primitives_culled: usize,
}

/// Candidates tried per step before the binary settles for the least covisible one.
const RUN_MAX_ATTEMPTS: usize = 8;

/// Configuration used when no file is given.
///
/// A closed orbit becomes fully covisible with the window once every camera
/// has been seen, so a run that must last its step count admits the least
/// covisible candidate instead of stopping.
pub fn default_run_config() -> SlamConfig {
    let mut config = SlamConfig::default();
    config.scheduler = config
        .scheduler
        .with_max_attempts(RUN_MAX_ATTEMPTS)
        .with_retry_limit_policy(RetryLimitPolicy::AdmitLeastCovisible);
    config
}

/// Load a [`SlamConfig`] from a JSON file. Missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<SlamConfig, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: SlamConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

/// Builder for configuring and running a training session.
pub struct AppBuilder {
    config: SlamConfig,
    source: DataSource,
    steps: u64,
    log_every: u64,
    summary_path: Option<PathBuf>,
    logging: LoggingConfig,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: default_run_config(),
            source: DataSource::Synthetic(SyntheticConfig::default()),
            steps: 200,
            log_every: 50,
            summary_path: None,
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SlamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Log a progress line every `steps` steps.
    pub fn with_log_every(mut self, steps: u64) -> Self {
        self.log_every = steps.max(1);
        self
    }

    pub fn with_summary_path(mut self, path: PathBuf) -> Self {
        self.summary_path = Some(path);
        self
    }

    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    /// Initialize logging, train, and write the summary if requested.
    pub fn run(self) -> Result<RunSummary, AppError> {
        self.init_logging();
        let summary = self.train()?;

        if let Some(path) = &self.summary_path {
            let json = serde_json::to_string_pretty(&summary)?;
            fs::write(path, json).map_err(|source| AppError::Write {
                path: path.clone(),
                source,
            })?;
            info!("Wrote run summary to {}", path.display());
        }
        Ok(summary)
    }

    /// Drive the training loop. Logging must already be set up.
    pub fn train(&self) -> Result<RunSummary, AppError> {
        let (stream, points) = self.load_source()?;
        if points.is_empty() {
            return Err(AppError::NoSeedPoints);
        }
        let gaussians = GaussianInitializer::default().from_points(&points);
        let scene = GaussianScene::new(gaussians, self.config.scene.clone());
        let mut pipeline = SlamPipeline::new(self.config.clone(), scene, stream)?;

        let initial_primitives = pipeline.scene().len();
        let mut summary = RunSummary {
            steps_run: 0,
            tracking_steps: 0,
            mapping_steps: 0,
            stopped_early: false,
            final_losses: LossDict::new(),
            final_metrics: MetricsDict::new(),
            scheduler: SchedulerStats::default(),
            frames_served: 0,
            window: Vec::new(),
            primitives: initial_primitives,
            primitives_culled: 0,
        };

        info!("Training for {} steps", self.steps);
        for step in 0..self.steps {
            let mode = pipeline.before_train_iteration(step);
            let output = match pipeline.compute_loss_and_metrics(step) {
                Ok(output) => output,
                Err(PipelineError::Scheduler(SchedulerError::StreamExhausted { attempts })) => {
                    warn!(
                        "No admissible frame at step {} after {} candidates, stopping",
                        step, attempts
                    );
                    summary.stopped_early = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            // Optimizer stepping over these groups happens outside this crate.
            let groups = pipeline.trainable_parameter_groups();
            let refined = pipeline.after_train_iteration(step);

            summary.steps_run += 1;
            summary.primitives_culled += refined.removed;
            match mode {
                Mode::Tracking => summary.tracking_steps += 1,
                Mode::Mapping => summary.mapping_steps += 1,
            }
            if step % self.log_every == 0 {
                info!(
                    "Step {} [{}] frame {}: loss {:.5}, psnr {:.2}, {} trainable groups",
                    step,
                    mode,
                    output.frame.index(),
                    output.total_loss(),
                    output.metrics.get("psnr").copied().unwrap_or_default(),
                    groups.len()
                );
            }
            summary.final_losses = output.losses;
            summary.final_metrics = output.metrics;
        }

        summary.scheduler = pipeline.scheduler().stats();
        summary.frames_served = pipeline.stream().frames_served();
        summary.window = pipeline.scheduler().window().indices();
        summary.primitives = pipeline.scene().len();
        info!(
            "Finished {} steps ({} tracking, {} mapping), {} primitives",
            summary.steps_run, summary.tracking_steps, summary.mapping_steps, summary.primitives
        );
        Ok(summary)
    }

    fn load_source(&self) -> Result<(DatasetStream, Vec<Point>), AppError> {
        match &self.source {
            DataSource::Synthetic(config) => synthetic::build(config),
            DataSource::Manifest(path) => {
                let manifest = load_manifest(path)?;
                info!("Loaded manifest with {} frames", manifest.len());
                let stream = load_dataset(&manifest)?;
                let points = match &manifest.ply_path {
                    Some(ply) => load_points_from_ply(ply)?,
                    None => Vec::new(),
                };
                Ok((stream, points))
            }
        }
    }

    fn init_logging(&self) {
        #[cfg(feature = "tracy")]
        {
            if self.logging.enable_tracy {
                use tracing_subscriber::Layer;
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;
                tracing_subscriber::registry()
                    .with(tracing_tracy::TracyLayer::default())
                    .with(
                        tracing_subscriber::fmt::layer().with_filter(
                            tracing_subscriber::EnvFilter::try_from_default_env()
                                .unwrap_or_else(|_| self.logging.level.clone().into()),
                        ),
                    )
                    .init();
                return;
            }
        }

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .init();
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsslam_train::window::SchedulerConfig;
    use gsslam_train::SamplingPolicy;

    fn small_source(frames: usize) -> DataSource {
        DataSource::Synthetic(SyntheticConfig {
            num_frames: frames,
            width: 32,
            height: 24,
            grid: 3,
            ..SyntheticConfig::default()
        })
    }

    #[test]
    fn test_fresh_sampling_runs_every_step() {
        let config = SlamConfig::default().with_sampling(SamplingPolicy::Fresh);
        let summary = AppBuilder::new()
            .with_config(config)
            .with_source(small_source(4))
            .with_steps(6)
            .train()
            .unwrap();
        assert_eq!(summary.steps_run, 6);
        assert_eq!(summary.tracking_steps, 3);
        assert_eq!(summary.mapping_steps, 3);
        assert!(!summary.stopped_early);
        assert!(summary.final_losses.contains_key("main_loss"));
        assert!(summary.window.is_empty());
        assert_eq!(summary.frames_served, 6);
    }

    #[test]
    fn test_default_run_completes() {
        let summary = AppBuilder::new().with_steps(40).train().unwrap();
        assert_eq!(summary.steps_run, 40);
        assert!(!summary.stopped_early);
        assert_eq!(summary.window.len(), 10);
        assert_eq!(summary.scheduler.admitted, 40);
        assert!(summary.frames_served >= 40);
    }

    #[test]
    fn test_windowed_run_respects_capacity() {
        let scheduler = SchedulerConfig::default()
            .with_max_window(Some(3))
            .with_max_attempts(2)
            .with_retry_limit_policy(RetryLimitPolicy::AdmitLeastCovisible);
        let summary = AppBuilder::new()
            .with_config(SlamConfig::default().with_scheduler(scheduler))
            .with_source(small_source(8))
            .with_steps(10)
            .train()
            .unwrap();
        assert_eq!(summary.steps_run, 10);
        assert!(!summary.stopped_early);
        assert_eq!(summary.window.len(), 3);
        assert_eq!(summary.scheduler.admitted, 10);
        assert_eq!(summary.scheduler.evicted, 7);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("gsslam-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        fs::write(&path, r#"{ "scheduler": { "max_window": 4 }, "mode": { "period": 2 } }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.scheduler.max_window, Some(4));
        assert_eq!(config.mode.period, 2);

        fs::write(&path, r#"{ "scheduler": { "max_window": 0 } }"#).unwrap();
        assert!(matches!(load_config(&path), Err(AppError::Config(_))));
        fs::remove_dir_all(&dir).unwrap();
    }
}
