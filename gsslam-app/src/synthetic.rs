//! Deterministic synthetic dataset
//!
//! A ring of cameras orbits a small colored point cloud. Ground-truth images
//! are rendered from the exact cloud with the reference scene, so a run needs
//! no files on disk.

use glam::Vec3;
use gsslam_data::{Camera, Gaussian, Intrinsics, Point};
use gsslam_train::ingest::{DatasetStream, Frame};
use gsslam_train::scene::{GaussianScene, RenderOutput, SceneConfig, SceneModel};
use image::{Rgb, RgbImage};
use std::f32::consts::TAU;
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub num_frames: usize,
    pub width: u32,
    pub height: u32,
    pub orbit_radius: f32,
    /// Points per side of the seed lattice.
    pub grid: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_frames: 24,
            width: 64,
            height: 48,
            orbit_radius: 4.0,
            grid: 6,
        }
    }
}

/// Seed points on a lattice in `[-1, 1]^3`, colored by position.
pub fn seed_points(grid: usize) -> Vec<Point> {
    let n = grid.max(2);
    let step = 2.0 / (n - 1) as f32;
    let mut points = Vec::with_capacity(n * n * n);
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let position = Vec3::new(i as f32, j as f32, k as f32) * step - Vec3::ONE;
                let color = (position + Vec3::ONE) * 0.5;
                points.push(Point::new(position, color));
            }
        }
    }
    points
}

/// Cameras on a slightly tilted circle, all looking at the origin.
pub fn orbit_cameras(config: &SyntheticConfig) -> Vec<Camera> {
    let focal = config.width as f32 * 0.8;
    let intrinsics = Intrinsics::centered(focal, focal, config.width, config.height);
    (0..config.num_frames)
        .map(|i| {
            let angle = TAU * i as f32 / config.num_frames.max(1) as f32;
            let eye = Vec3::new(
                config.orbit_radius * angle.sin(),
                0.3 * config.orbit_radius,
                config.orbit_radius * angle.cos(),
            );
            Camera::looking_at(i, eye, Vec3::ZERO, Vec3::Y, intrinsics)
        })
        .collect()
}

/// Build the frame stream and the seed points for a synthetic run.
pub fn build(config: &SyntheticConfig) -> Result<(DatasetStream, Vec<Point>), AppError> {
    let points = seed_points(config.grid);
    let truth: Vec<Gaussian> = points
        .iter()
        .map(|p| Gaussian::spherical(p.position, 0.12, p.color, 0.9))
        .collect();
    let renderer = GaussianScene::new(truth, SceneConfig::default().with_num_downscales(0));

    let frames = orbit_cameras(config)
        .into_iter()
        .map(|camera| {
            let output = renderer.render(&camera, 0)?;
            Ok(Frame::new(camera, to_image(&output)))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    info!(
        "Synthetic dataset: {} frames at {}x{}, {} seed points",
        frames.len(),
        config.width,
        config.height,
        points.len()
    );
    Ok((DatasetStream::from_frames(frames)?, points))
}

fn to_image(output: &RenderOutput) -> RgbImage {
    RgbImage::from_fn(output.width, output.height, |x, y| {
        let c = output.rgb[(y * output.width + x) as usize].clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
        Rgb([c.x as u8, c.y as u8, c.z as u8])
    })
}
