//! Gaussian initialization from seed point clouds

use gsslam_data::{Gaussian, Point};
use glam::{IVec3, Vec3};
use std::collections::HashMap;
use tracing::debug;

/// Initial opacity of seeded primitives.
const INITIAL_OPACITY: f32 = 0.1;

/// Strategy for initializing Gaussians from seed points
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitializationStrategy {
    /// One isotropic Gaussian per point with a fixed scale
    OnePerPoint { scale: f32 },
    /// One Gaussian per point, scaled by the mean distance to its `k` nearest neighbours
    NeighborScaled { k: usize },
    /// One Gaussian per occupied voxel, at the mean position and color of its points
    VoxelGrid { size: f32 },
}

/// Initializes Gaussians from seed points
pub struct GaussianInitializer {
    strategy: InitializationStrategy,
}

impl GaussianInitializer {
    pub fn new(strategy: InitializationStrategy) -> Self {
        Self { strategy }
    }

    /// Initialize Gaussians from a point cloud
    pub fn from_points(&self, points: &[Point]) -> Vec<Gaussian> {
        let gaussians = match self.strategy {
            InitializationStrategy::OnePerPoint { scale } => points
                .iter()
                .map(|p| seeded(p.position, p.color, scale))
                .collect(),
            InitializationStrategy::NeighborScaled { k } => neighbor_scaled(points, k),
            InitializationStrategy::VoxelGrid { size } => voxel_grid(points, size),
        };
        debug!(
            "Initialized {} Gaussians from {} points ({:?})",
            gaussians.len(),
            points.len(),
            self.strategy
        );
        gaussians
    }
}

impl Default for GaussianInitializer {
    fn default() -> Self {
        Self::new(InitializationStrategy::NeighborScaled { k: 3 })
    }
}

fn seeded(position: Vec3, color: Vec3, scale: f32) -> Gaussian {
    Gaussian::new(
        position,
        [0.0, 0.0, 0.0, 1.0],
        Vec3::splat(scale),
        color,
        INITIAL_OPACITY,
    )
}

// Brute force; seed clouds are small.
fn neighbor_scaled(points: &[Point], k: usize) -> Vec<Gaussian> {
    let k = k.max(1);
    let mut distances = Vec::with_capacity(points.len());
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            distances.clear();
            distances.extend(
                points
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, q)| p.position.distance(q.position)),
            );
            distances.sort_by(f32::total_cmp);
            let nearest = &distances[..k.min(distances.len())];
            let scale = if nearest.is_empty() {
                0.01
            } else {
                (nearest.iter().sum::<f32>() / nearest.len() as f32).max(1e-7)
            };
            seeded(p.position, p.color, scale)
        })
        .collect()
}

fn voxel_grid(points: &[Point], size: f32) -> Vec<Gaussian> {
    let size = size.max(f32::EPSILON);
    let mut cells: HashMap<IVec3, (Vec3, Vec3, u32)> = HashMap::new();
    let mut order = Vec::new();
    for p in points {
        let key = (p.position / size).floor().as_ivec3();
        let cell = cells.entry(key).or_insert_with(|| {
            order.push(key);
            (Vec3::ZERO, Vec3::ZERO, 0)
        });
        cell.0 += p.position;
        cell.1 += p.color;
        cell.2 += 1;
    }
    order
        .into_iter()
        .filter_map(|key| cells.get(&key))
        .map(|(pos, color, n)| {
            let n = *n as f32;
            seeded(*pos / n, *color / n, size * 0.5)
        })
        .collect()
}
