//! Learnable pose adjustments keyed by camera index

use crate::scene::{LossDict, MetricsDict, ParamGroups, ParamTensor};
use crate::tracker::exp_map::{exp_se3, exp_so3xr3};
use glam::{Mat3, Vec3};
use gsslam_data::Camera;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the optimizer group holding every pose adjustment.
pub const CAMERA_OPT_GROUP: &str = "camera_opt";

/// One correction: `[tx, ty, tz, wx, wy, wz]` in the tangent space of the pose.
pub type PoseCorrection = [f32; 6];

/// Parameterization of the pose correction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerMode {
    /// Corrections are not applied and not optimized.
    #[serde(rename = "off")]
    Off,
    /// Independent rotation (exp map) and translation.
    #[serde(rename = "SO3xR3")]
    So3xR3,
    /// Rigid SE(3) exp map.
    #[default]
    #[serde(rename = "SE3")]
    Se3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub mode: TrackerMode,
    /// Weight on the summed translation norms.
    pub trans_l2_penalty: f32,
    /// Weight on the summed rotation norms.
    pub rot_l2_penalty: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            mode: TrackerMode::Se3,
            trans_l2_penalty: 0.0,
            rot_l2_penalty: 0.0,
        }
    }
}

impl TrackerConfig {
    pub fn with_mode(mut self, mode: TrackerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_penalties(mut self, translation: f32, rotation: f32) -> Self {
        self.trans_l2_penalty = translation;
        self.rot_l2_penalty = rotation;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("Camera index {index} is not registered (tracker holds {num_cameras} cameras)")]
    InvalidCameraIndex { index: usize, num_cameras: usize },
}

/// Pose adjustment estimator: one zero-initialized correction per camera.
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackerConfig,
    adjustments: Vec<PoseCorrection>,
}

impl Tracker {
    /// Allocate corrections for cameras `0..num_cameras`.
    pub fn setup(config: TrackerConfig, num_cameras: usize) -> Self {
        debug!("Tracker set up for {} cameras ({:?})", num_cameras, config.mode);
        Self {
            config,
            adjustments: vec![[0.0; 6]; num_cameras],
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn mode(&self) -> TrackerMode {
        self.config.mode
    }

    pub fn num_cameras(&self) -> usize {
        self.adjustments.len()
    }

    fn check(&self, index: usize) -> Result<usize, TrackerError> {
        if index < self.adjustments.len() {
            Ok(index)
        } else {
            Err(TrackerError::InvalidCameraIndex {
                index,
                num_cameras: self.adjustments.len(),
            })
        }
    }

    pub fn correction(&self, index: usize) -> Result<&PoseCorrection, TrackerError> {
        let index = self.check(index)?;
        Ok(&self.adjustments[index])
    }

    /// Mutable access for the external optimizer.
    pub fn correction_mut(&mut self, index: usize) -> Result<&mut PoseCorrection, TrackerError> {
        let index = self.check(index)?;
        Ok(&mut self.adjustments[index])
    }

    /// Rigid transform encoded by the correction of camera `index`.
    pub fn correction_transform(&self, index: usize) -> Result<(Mat3, Vec3), TrackerError> {
        let correction = self.correction(index)?;
        Ok(match self.config.mode {
            TrackerMode::Off => (Mat3::IDENTITY, Vec3::ZERO),
            TrackerMode::So3xR3 => exp_so3xr3(correction),
            TrackerMode::Se3 => exp_se3(correction),
        })
    }

    /// Corrected copy of `camera`: `camera_to_world * exp(correction)`.
    ///
    /// The composition is smooth in the correction, so an autodiff backend
    /// can carry the render loss back into it. Call once per render.
    pub fn apply_to_camera(&self, camera: &Camera) -> Result<Camera, TrackerError> {
        let (rotation, translation) = self.correction_transform(camera.index)?;
        Ok(camera.with_pose(
            camera.rotation * rotation,
            camera.rotation * translation + camera.translation,
        ))
    }

    /// The `camera_opt` group, or nothing when corrections are disabled.
    pub fn param_groups(&self) -> ParamGroups {
        if self.config.mode == TrackerMode::Off {
            return ParamGroups::new();
        }
        ParamGroups::from([(
            CAMERA_OPT_GROUP.to_string(),
            vec![ParamTensor::new("pose_adjustment", [self.adjustments.len(), 6])],
        )])
    }

    /// `camera_opt_regularizer`: penalty-weighted sum of per-camera norms.
    pub fn loss_terms(&self) -> LossDict {
        if self.config.mode == TrackerMode::Off {
            return LossDict::new();
        }
        let (translation, rotation) = self
            .adjustments
            .iter()
            .map(|a| split_norms(a))
            .fold((0.0, 0.0), |(t, r), (dt, dr)| (t + dt, r + dr));
        LossDict::from([(
            "camera_opt_regularizer".to_string(),
            translation * self.config.trans_l2_penalty + rotation * self.config.rot_l2_penalty,
        )])
    }

    /// Overall magnitude of the translation and rotation corrections.
    pub fn metric_terms(&self) -> MetricsDict {
        if self.config.mode == TrackerMode::Off {
            return MetricsDict::new();
        }
        let (translation_sq, rotation_sq) = self
            .adjustments
            .iter()
            .map(|a| {
                let (t, r) = split_norms(a);
                (t * t, r * r)
            })
            .fold((0.0f32, 0.0f32), |(t, r), (dt, dr)| (t + dt, r + dr));
        MetricsDict::from([
            ("camera_opt_translation".to_string(), translation_sq.sqrt()),
            ("camera_opt_rotation".to_string(), rotation_sq.sqrt()),
        ])
    }
}

fn split_norms(a: &PoseCorrection) -> (f32, f32) {
    (
        Vec3::new(a[0], a[1], a[2]).length(),
        Vec3::new(a[3], a[4], a[5]).length(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsslam_data::Intrinsics;
    use std::f32::consts::FRAC_PI_2;

    fn camera(index: usize) -> Camera {
        Camera::looking_at(
            index,
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::ZERO,
            Vec3::Y,
            Intrinsics::centered(10.0, 10.0, 10, 10),
        )
    }

    #[test]
    fn test_setup_is_zero_initialized() {
        let tracker = Tracker::setup(TrackerConfig::default(), 4);
        assert_eq!(tracker.num_cameras(), 4);
        for i in 0..4 {
            assert_eq!(tracker.correction(i).unwrap(), &[0.0; 6]);
        }
    }

    #[test]
    fn test_zero_correction_leaves_pose_unchanged() {
        let tracker = Tracker::setup(TrackerConfig::default(), 2);
        let cam = camera(1);
        let corrected = tracker.apply_to_camera(&cam).unwrap();
        assert!(corrected.rotation.abs_diff_eq(cam.rotation, 1e-6));
        assert!((corrected.translation - cam.translation).length() < 1e-6);
        assert_eq!(corrected.intrinsics, cam.intrinsics);
    }

    #[test]
    fn test_correction_is_applied_in_camera_frame() {
        let mut tracker = Tracker::setup(TrackerConfig::default(), 1);
        // One unit along the camera's local +Z (backwards, away from the target).
        *tracker.correction_mut(0).unwrap() = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let corrected = tracker.apply_to_camera(&camera(0)).unwrap();
        assert!((corrected.translation - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-6);
    }

    #[test]
    fn test_rotation_correction_composes_on_the_right() {
        let mut tracker = Tracker::setup(TrackerConfig::default().with_mode(TrackerMode::So3xR3), 1);
        *tracker.correction_mut(0).unwrap() = [0.0, 0.0, 0.0, 0.0, FRAC_PI_2, 0.0];
        let cam = camera(0);
        let corrected = tracker.apply_to_camera(&cam).unwrap();
        let expected = cam.rotation * Mat3::from_rotation_y(FRAC_PI_2);
        assert!(corrected.rotation.abs_diff_eq(expected, 1e-6));
        assert_eq!(corrected.translation, cam.translation);
    }

    #[test]
    fn test_off_mode_ignores_corrections() {
        let mut tracker = Tracker::setup(TrackerConfig::default().with_mode(TrackerMode::Off), 1);
        *tracker.correction_mut(0).unwrap() = [1.0; 6];
        let cam = camera(0);
        assert_eq!(tracker.apply_to_camera(&cam).unwrap(), cam);
        assert!(tracker.param_groups().is_empty());
        assert!(tracker.loss_terms().is_empty());
    }

    #[test]
    fn test_unknown_camera_index_fails() {
        let tracker = Tracker::setup(TrackerConfig::default(), 3);
        let err = tracker.apply_to_camera(&camera(3)).unwrap_err();
        assert_eq!(
            err,
            TrackerError::InvalidCameraIndex {
                index: 3,
                num_cameras: 3
            }
        );
    }

    #[test]
    fn test_param_groups_expose_camera_opt_only() {
        let tracker = Tracker::setup(TrackerConfig::default(), 5);
        let groups = tracker.param_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[CAMERA_OPT_GROUP][0].shape, vec![5, 6]);
    }

    #[test]
    fn test_regularizer_and_metrics() {
        let config = TrackerConfig::default().with_penalties(0.5, 2.0);
        let mut tracker = Tracker::setup(config, 2);
        *tracker.correction_mut(0).unwrap() = [3.0, 4.0, 0.0, 0.0, 0.0, 1.0];
        *tracker.correction_mut(1).unwrap() = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0];

        let losses = tracker.loss_terms();
        // 5 * 0.5 + (1 + 1) * 2.0
        assert!((losses["camera_opt_regularizer"] - 6.5).abs() < 1e-6);

        let metrics = tracker.metric_terms();
        assert!((metrics["camera_opt_translation"] - 5.0).abs() < 1e-6);
        assert!((metrics["camera_opt_rotation"] - 2.0f32.sqrt()).abs() < 1e-6);
    }
}
