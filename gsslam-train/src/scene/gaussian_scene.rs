//! CPU reference Gaussian scene
//!
//! A small, dependency-free stand-in for a GPU splatting renderer. It uses the
//! same projection as the covisibility scorer, composites primitives front to
//! back and reports the usual parameter groups. Good enough to drive the
//! training loop end to end on small synthetic scenes.

use crate::ingest::Frame;
use crate::scene::projection::{self, ProjectionRequest};
use crate::scene::{
    LossDict, MetricsDict, ParamGroups, ParamTensor, Projection, RefineOutcome, SceneError,
    SceneModel,
};
use glam::{Vec2, Vec3};
use gsslam_data::{Camera, Gaussian};
use image::RgbImage;
use image::imageops::FilterType;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::debug;

/// Contributions below this alpha are skipped.
const MIN_ALPHA: f32 = 1.0 / 255.0;
const MAX_ALPHA: f32 = 0.999;
/// Pixels this close to opaque stop accumulating.
const MIN_TRANSMITTANCE: f32 = 1e-4;

/// Resolution schedule and refinement settings for [`GaussianScene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Training starts at `1 / 2^num_downscales` resolution.
    pub num_downscales: u32,
    /// Steps between resolution doublings.
    pub resolution_schedule: u64,
    /// No refinement before this step.
    pub warmup_length: u64,
    /// Steps between refinement passes.
    pub refine_every: u64,
    /// Opacity is reset every `reset_alpha_every * refine_every` steps.
    pub reset_alpha_every: u64,
    /// Primitives below this opacity are culled.
    pub cull_alpha_thresh: f32,
    /// RGB background composited behind the primitives.
    pub background: [f32; 3],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            num_downscales: 2,
            resolution_schedule: 3000,
            warmup_length: 500,
            refine_every: 100,
            reset_alpha_every: 30,
            cull_alpha_thresh: 0.1,
            background: [0.0, 0.0, 0.0],
        }
    }
}

impl SceneConfig {
    pub fn with_num_downscales(mut self, num_downscales: u32) -> Self {
        self.num_downscales = num_downscales;
        self
    }

    pub fn with_resolution_schedule(mut self, steps: u64) -> Self {
        self.resolution_schedule = steps;
        self
    }

    pub fn with_warmup_length(mut self, steps: u64) -> Self {
        self.warmup_length = steps;
        self
    }

    pub fn with_refine_every(mut self, steps: u64) -> Self {
        self.refine_every = steps;
        self
    }

    pub fn with_background(mut self, background: Vec3) -> Self {
        self.background = background.to_array();
        self
    }
}

/// Rendered images at the scene's working resolution.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub width: u32,
    pub height: u32,
    /// Linear RGB, row major.
    pub rgb: Vec<Vec3>,
    /// Alpha-weighted expected depth.
    pub depth: Vec<f32>,
    /// Accumulated opacity per pixel.
    pub accumulation: Vec<f32>,
    /// Number of primitives that reached the rasterizer.
    pub rasterized: usize,
}

/// A static scene made of 3D Gaussians.
#[derive(Debug, Clone, Default)]
pub struct GaussianScene {
    gaussians: Vec<Gaussian>,
    config: SceneConfig,
}

impl GaussianScene {
    pub fn new(gaussians: Vec<Gaussian>, config: SceneConfig) -> Self {
        Self { gaussians, config }
    }

    pub fn gaussians(&self) -> &[Gaussian] {
        &self.gaussians
    }

    /// Mutable access for the external optimizer.
    pub fn gaussians_mut(&mut self) -> &mut Vec<Gaussian> {
        &mut self.gaussians
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    fn background(&self) -> Vec3 {
        Vec3::from_array(self.config.background)
    }

    fn rasterize(&self, projection: &Projection, width: u32, height: u32) -> RenderOutput {
        let mut order: Vec<usize> = projection.rasterized().collect();
        order.sort_by_key(|&i| OrderedFloat(projection.depths[i]));

        let pixels = (width * height) as usize;
        let mut rgb = vec![Vec3::ZERO; pixels];
        let mut depth = vec![0.0; pixels];
        let mut transmittance = vec![1.0f32; pixels];

        for &i in &order {
            let g = &self.gaussians[i];
            let center = projection.xys[i];
            let radius = projection.radii[i] as f32;
            let conic = projection.conics[i];
            let (Some((x0, x1)), Some((y0, y1))) = (
                pixel_span(center.x, radius, width),
                pixel_span(center.y, radius, height),
            ) else {
                continue;
            };

            for y in y0..=y1 {
                for x in x0..=x1 {
                    let d = Vec2::new(x as f32, y as f32) - center;
                    let sigma = 0.5 * (conic.x * d.x * d.x + conic.z * d.y * d.y) + conic.y * d.x * d.y;
                    if sigma < 0.0 {
                        continue;
                    }
                    let alpha = (g.opacity * (-sigma).exp()).min(MAX_ALPHA);
                    if alpha < MIN_ALPHA {
                        continue;
                    }
                    let idx = (y * width + x) as usize;
                    let t = transmittance[idx];
                    if t < MIN_TRANSMITTANCE {
                        continue;
                    }
                    let weight = t * alpha;
                    rgb[idx] += weight * g.color;
                    depth[idx] += weight * projection.depths[i];
                    transmittance[idx] = t * (1.0 - alpha);
                }
            }
        }

        let background = self.background();
        for (color, t) in rgb.iter_mut().zip(&transmittance) {
            *color += *t * background;
        }

        RenderOutput {
            width,
            height,
            rgb,
            depth,
            accumulation: transmittance.iter().map(|t| 1.0 - t).collect(),
            rasterized: order.len(),
        }
    }
}

/// Inclusive pixel range covered by `center ± radius`, clipped to the image.
fn pixel_span(center: f32, radius: f32, size: u32) -> Option<(u32, u32)> {
    let lo = (center - radius).floor().max(0.0);
    let hi = (center + radius).ceil().min(size as f32 - 1.0);
    (hi >= lo).then_some((lo as u32, hi as u32))
}

/// Ground truth resized to the render resolution.
fn ground_truth(frame: &Frame, width: u32, height: u32) -> Cow<'_, RgbImage> {
    if frame.dimensions() == (width, height) {
        Cow::Borrowed(&frame.image)
    } else {
        Cow::Owned(image::imageops::resize(&frame.image, width, height, FilterType::Triangle))
    }
}

fn pixel_errors<'a>(
    output: &'a RenderOutput,
    gt: &'a RgbImage,
) -> impl Iterator<Item = Vec3> + 'a {
    output.rgb.iter().zip(gt.pixels()).map(|(rendered, p)| {
        let target = Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) / 255.0;
        rendered.clamp(Vec3::ZERO, Vec3::ONE) - target
    })
}

impl SceneModel for GaussianScene {
    type Output = RenderOutput;

    fn num_primitives(&self) -> usize {
        self.gaussians.len()
    }

    fn downscale_factor(&self, step: u64) -> u32 {
        if self.config.resolution_schedule == 0 {
            return 1;
        }
        let doublings = (step / self.config.resolution_schedule).min(u32::MAX as u64) as u32;
        1 << self.config.num_downscales.saturating_sub(doublings).min(31)
    }

    fn project(&self, request: &ProjectionRequest) -> Projection {
        projection::project_gaussians(&self.gaussians, request)
    }

    fn render(&self, camera: &Camera, step: u64) -> Result<RenderOutput, SceneError> {
        let camera = camera.rescaled(1.0 / self.downscale_factor(step) as f32);
        let (width, height) = (camera.width(), camera.height());
        if width == 0 || height == 0 {
            return Err(SceneError::EmptyImage {
                index: camera.index,
                width,
                height,
            });
        }
        let projection = self.project(&ProjectionRequest::for_camera(&camera));
        let output = self.rasterize(&projection, width, height);
        debug!(
            "Rendered camera {} at {}x{}: {} of {} primitives rasterized",
            camera.index,
            width,
            height,
            output.rasterized,
            self.gaussians.len()
        );
        Ok(output)
    }

    fn metrics(&self, output: &RenderOutput, frame: &Frame) -> MetricsDict {
        let gt = ground_truth(frame, output.width, output.height);
        let count = (output.rgb.len() * 3).max(1) as f32;
        let mse = pixel_errors(output, &gt)
            .map(|e| e.length_squared())
            .sum::<f32>()
            / count;
        let psnr = 10.0 * (1.0 / mse.max(1e-10)).log10();

        MetricsDict::from([
            ("psnr".to_string(), psnr),
            ("gaussian_count".to_string(), self.gaussians.len() as f32),
        ])
    }

    fn losses(&self, output: &RenderOutput, frame: &Frame, _metrics: &MetricsDict) -> LossDict {
        let gt = ground_truth(frame, output.width, output.height);
        let count = (output.rgb.len() * 3).max(1) as f32;
        let l1 = pixel_errors(output, &gt)
            .map(|e| e.abs().element_sum())
            .sum::<f32>()
            / count;
        LossDict::from([("main_loss".to_string(), l1)])
    }

    fn parameter_groups(&self) -> ParamGroups {
        let n = self.gaussians.len();
        [
            ("xyz", 3),
            ("features_dc", 3),
            ("opacity", 1),
            ("scaling", 3),
            ("rotation", 4),
        ]
        .into_iter()
        .map(|(name, width)| (name.to_string(), vec![ParamTensor::new(name, [n, width])]))
        .collect()
    }

    fn refine(&mut self, step: u64) -> RefineOutcome {
        let config = &self.config;
        if config.refine_every == 0 || step <= config.warmup_length || step % config.refine_every != 0 {
            return RefineOutcome::default();
        }

        let before = self.gaussians.len();
        let threshold = config.cull_alpha_thresh;
        self.gaussians.retain(|g| g.opacity >= threshold);
        let removed = before - self.gaussians.len();

        let reset_interval = config.reset_alpha_every * config.refine_every;
        let opacity_reset = reset_interval > 0 && step % reset_interval == 0;
        if opacity_reset {
            let ceiling = threshold * 2.0;
            for g in &mut self.gaussians {
                g.opacity = g.opacity.min(ceiling);
            }
        }

        debug!(
            "Refinement at step {}: culled {} primitives, opacity reset: {}",
            step, removed, opacity_reset
        );
        RefineOutcome {
            removed,
            added: 0,
            opacity_reset,
        }
    }
}
