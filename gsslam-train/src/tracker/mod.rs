//! Per-camera pose correction
//!
//! Input camera poses are assumed to be slightly wrong. The tracker keeps one
//! learnable rigid-transform delta per training camera and composes it with
//! the camera's pose right before rendering. The deltas are only optimized
//! during the tracking phase.

pub mod exp_map;
pub mod pose_adjustment;

pub use pose_adjustment::{
    CAMERA_OPT_GROUP, PoseCorrection, Tracker, TrackerConfig, TrackerError, TrackerMode,
};
