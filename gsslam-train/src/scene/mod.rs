//! Scene representation and the renderer capability interface
//!
//! The training loop never reaches into a renderer's internals. It talks to
//! the scene through [`SceneModel`]: render a camera, score the result,
//! report parameter groups, refine, and project primitives for covisibility.
//! [`GaussianScene`] is the CPU reference implementation.

pub mod gaussian_scene;
pub mod initializer;
pub mod projection;

use crate::ingest::Frame;
use gsslam_data::Camera;
use std::collections::BTreeMap;

pub use gaussian_scene::{GaussianScene, RenderOutput, SceneConfig};
pub use initializer::{GaussianInitializer, InitializationStrategy};
pub use projection::{Projection, ProjectionRequest, TileGrid};

/// Named scalar losses, summed by the external optimizer.
pub type LossDict = BTreeMap<String, f32>;
/// Named scalar metrics for logging.
pub type MetricsDict = BTreeMap<String, f32>;
/// Parameter groups keyed by optimizer name.
pub type ParamGroups = BTreeMap<String, Vec<ParamTensor>>;

/// Handle to one trainable tensor, identified by name and shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamTensor {
    pub name: String,
    pub shape: Vec<usize>,
}

impl ParamTensor {
    pub fn new(name: impl Into<String>, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            name: name.into(),
            shape: shape.into(),
        }
    }

    /// Total number of scalars.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// What a refinement pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefineOutcome {
    pub removed: usize,
    pub added: usize,
    pub opacity_reset: bool,
}

/// Errors raised by scene models
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("Camera {index} renders to an empty {width}x{height} image")]
    EmptyImage { index: usize, width: u32, height: u32 },
    #[error("Render failed: {0}")]
    Render(String),
}

/// Capabilities the training loop needs from a differentiable scene renderer.
pub trait SceneModel {
    /// Renderer outputs consumed by `metrics` and `losses`.
    type Output;

    fn num_primitives(&self) -> usize;

    /// Current image downscale factor; cameras are rendered at `1 / factor`.
    fn downscale_factor(&self, step: u64) -> u32;

    /// Project all primitives into one camera.
    fn project(&self, request: &ProjectionRequest) -> Projection;

    /// Render a (pose-corrected) camera.
    fn render(&self, camera: &Camera, step: u64) -> Result<Self::Output, SceneError>;

    fn metrics(&self, output: &Self::Output, frame: &Frame) -> MetricsDict;

    fn losses(&self, output: &Self::Output, frame: &Frame, metrics: &MetricsDict) -> LossDict;

    /// The scene's own trainable groups (positions, colors, opacity, scale, rotation).
    fn parameter_groups(&self) -> ParamGroups;

    /// Densify, prune or reset primitives after an optimizer step.
    fn refine(&mut self, step: u64) -> RefineOutcome;
}
