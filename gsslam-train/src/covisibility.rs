//! Covisibility between two cameras
//!
//! Both cameras are projected against the current scene at the working
//! resolution. A primitive counts as visible from a camera when it is
//! rasterized (non-zero radius) and lies nearer than the mean projected depth.
//! The score is the Jaccard index of the two visible sets.
//!
//! This is an approximate heuristic. The mean-depth cut is a cheap stand-in
//! for occlusion reasoning, and culled primitives enter the mean with depth 0.

use crate::ingest::Frame;
use crate::scene::{ProjectionRequest, SceneModel};
use gsslam_data::Camera;
use std::collections::BTreeSet;
use tracing::trace;

/// Pairwise similarity of two frames in `[0, 1]`.
///
/// The window scheduler only sees this trait, so tests can substitute a fixed
/// score table for the scene-based scorer.
pub trait CovisibilityMeasure {
    fn score(&self, a: &Frame, b: &Frame) -> f32;
}

/// Scores frames against a scene as it is at one training step.
#[derive(Debug, Clone, Copy)]
pub struct CovisibilityScorer<'a, S> {
    scene: &'a S,
    step: u64,
}

impl<'a, S: SceneModel> CovisibilityScorer<'a, S> {
    pub fn new(scene: &'a S, step: u64) -> Self {
        Self { scene, step }
    }

    /// Indices of primitives visible from `camera`.
    pub fn visible_set(&self, camera: &Camera) -> BTreeSet<usize> {
        let factor = self.scene.downscale_factor(self.step).max(1);
        let camera = camera.rescaled(1.0 / factor as f32);
        let projection = self.scene.project(&ProjectionRequest::for_camera(&camera));
        if projection.is_empty() {
            return BTreeSet::new();
        }

        let mean_depth = projection.depths.iter().sum::<f32>() / projection.len() as f32;
        projection
            .rasterized()
            .filter(|&i| projection.depths[i] < mean_depth)
            .collect()
    }

    /// Jaccard index of the visible sets of `a` and `b`; zero when neither sees anything.
    pub fn score_cameras(&self, a: &Camera, b: &Camera) -> f32 {
        let visible_a = self.visible_set(a);
        let visible_b = self.visible_set(b);
        let intersection = visible_a.intersection(&visible_b).count();
        let union = visible_a.len() + visible_b.len() - intersection;
        let score = if union == 0 {
            0.0
        } else {
            intersection as f32 / union as f32
        };
        trace!(
            "Covisibility {} <-> {}: {}/{} = {:.3}",
            a.index, b.index, intersection, union, score
        );
        score
    }
}

impl<S: SceneModel> CovisibilityMeasure for CovisibilityScorer<'_, S> {
    fn score(&self, a: &Frame, b: &Frame) -> f32 {
        self.score_cameras(&a.camera, &b.camera)
    }
}
