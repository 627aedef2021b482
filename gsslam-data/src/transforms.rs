//! nerfstudio-style `transforms.json` manifests.
//!
//! A manifest lists the training images together with their camera-to-world
//! matrices and pinhole intrinsics. Intrinsics may be given once at the top
//! level and overridden per frame. Blender-style manifests that only carry
//! `camera_angle_x` are accepted when the image width is known.

use crate::camera::{Camera, Intrinsics};
use crate::error::DataError;
use glam::{Mat4, Vec4};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Deserialize)]
struct RawIntrinsics {
    fl_x: Option<f32>,
    fl_y: Option<f32>,
    cx: Option<f32>,
    cy: Option<f32>,
    w: Option<u32>,
    h: Option<u32>,
    camera_angle_x: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    file_path: PathBuf,
    transform_matrix: [[f32; 4]; 4],
    #[serde(flatten)]
    intrinsics: RawIntrinsics,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(flatten)]
    intrinsics: RawIntrinsics,
    #[serde(default)]
    ply_file_path: Option<PathBuf>,
    frames: Vec<RawFrame>,
}

/// One training image and the camera it was taken with.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFrame {
    pub image_path: PathBuf,
    pub camera: Camera,
}

/// Parsed dataset manifest with paths resolved against its directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub frames: Vec<ManifestFrame>,
    /// Optional sparse point cloud used to seed the scene.
    pub ply_path: Option<PathBuf>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn cameras(&self) -> impl Iterator<Item = &Camera> {
        self.frames.iter().map(|f| &f.camera)
    }
}

/// Read and parse a manifest file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Manifest, DataError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let manifest = parse_manifest(&text, base)?;
    info!(
        "Manifest loaded: {} frames, seed cloud: {}",
        manifest.len(),
        manifest.ply_path.is_some()
    );
    Ok(manifest)
}

/// Parse manifest JSON. Relative paths are joined onto `base`.
pub fn parse_manifest(json: &str, base: &Path) -> Result<Manifest, DataError> {
    let raw: RawManifest = serde_json::from_str(json)?;
    let defaults = raw.intrinsics;

    let frames = raw
        .frames
        .into_iter()
        .enumerate()
        .map(|(index, frame)| {
            let intrinsics = resolve_intrinsics(index, &frame.intrinsics, &defaults)?;
            let camera_to_world = row_major_to_mat4(&frame.transform_matrix);
            if Mat4::determinant(&camera_to_world).abs() <= f32::EPSILON {
                return Err(DataError::DegenerateTransform { index });
            }
            Ok(ManifestFrame {
                image_path: base.join(frame.file_path),
                camera: Camera::from_matrix(index, camera_to_world, intrinsics),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Parsed {} manifest frames", frames.len());

    Ok(Manifest {
        frames,
        ply_path: raw.ply_file_path.map(|p| base.join(p)),
    })
}

fn row_major_to_mat4(rows: &[[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols(
        Vec4::from_array(rows[0]),
        Vec4::from_array(rows[1]),
        Vec4::from_array(rows[2]),
        Vec4::from_array(rows[3]),
    )
    .transpose()
}

fn resolve_intrinsics(
    index: usize,
    frame: &RawIntrinsics,
    defaults: &RawIntrinsics,
) -> Result<Intrinsics, DataError> {
    let missing = |field| DataError::MissingIntrinsic { index, field };

    let width = frame.w.or(defaults.w).ok_or_else(|| missing("w"))?;
    let height = frame.h.or(defaults.h).ok_or_else(|| missing("h"))?;

    let angle_x = frame.camera_angle_x.or(defaults.camera_angle_x);
    let fx = frame
        .fl_x
        .or(defaults.fl_x)
        .or_else(|| angle_x.map(|a| 0.5 * width as f32 / (0.5 * a).tan()))
        .ok_or_else(|| missing("fl_x"))?;
    let fy = frame.fl_y.or(defaults.fl_y).unwrap_or(fx);

    Ok(Intrinsics {
        fx,
        fy,
        cx: frame.cx.or(defaults.cx).unwrap_or(width as f32 / 2.0),
        cy: frame.cy.or(defaults.cy).unwrap_or(height as f32 / 2.0),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const MANIFEST: &str = r#"{
        "fl_x": 500.0, "fl_y": 510.0, "w": 640, "h": 480,
        "ply_file_path": "sparse_pc.ply",
        "frames": [
            {
                "file_path": "images/frame_00001.png",
                "transform_matrix": [
                    [1.0, 0.0, 0.0, 1.0],
                    [0.0, 1.0, 0.0, 2.0],
                    [0.0, 0.0, 1.0, 3.0],
                    [0.0, 0.0, 0.0, 1.0]
                ]
            },
            {
                "file_path": "images/frame_00002.png",
                "fl_x": 250.0, "cx": 100.0,
                "transform_matrix": [
                    [1.0, 0.0, 0.0, 0.0],
                    [0.0, 1.0, 0.0, 0.0],
                    [0.0, 0.0, 1.0, 0.0],
                    [0.0, 0.0, 0.0, 1.0]
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_manifest_defaults_and_overrides() {
        let manifest = parse_manifest(MANIFEST, Path::new("/data/scene")).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.ply_path, Some(PathBuf::from("/data/scene/sparse_pc.ply")));

        let first = &manifest.frames[0];
        assert_eq!(first.image_path, PathBuf::from("/data/scene/images/frame_00001.png"));
        assert_eq!(first.camera.index, 0);
        assert_eq!(first.camera.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(first.camera.intrinsics.fx, 500.0);
        assert_eq!(first.camera.intrinsics.fy, 510.0);
        assert_eq!(first.camera.intrinsics.cx, 320.0);

        let second = &manifest.frames[1].camera;
        assert_eq!(second.index, 1);
        assert_eq!(second.intrinsics.fx, 250.0);
        assert_eq!(second.intrinsics.cx, 100.0);
        assert_eq!(second.intrinsics.height, 480);
    }

    #[test]
    fn test_camera_angle_x_gives_focal_length() {
        let json = r#"{
            "camera_angle_x": 1.5707964, "w": 200, "h": 100,
            "frames": [{"file_path": "a.png", "transform_matrix": [
                [1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]]}]
        }"#;
        let manifest = parse_manifest(json, Path::new("")).unwrap();
        let k = manifest.frames[0].camera.intrinsics;
        assert!((k.fx - 100.0).abs() < 1e-3);
        assert_eq!(k.fy, k.fx);
    }

    #[test]
    fn test_missing_size_is_an_error() {
        let json = r#"{"fl_x": 1.0, "frames": [{"file_path": "a.png", "transform_matrix": [
            [1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]]}]}"#;
        let err = parse_manifest(json, Path::new("")).unwrap_err();
        assert!(matches!(err, DataError::MissingIntrinsic { index: 0, field: "w" }));
    }

    #[test]
    fn test_degenerate_transform_is_rejected() {
        let json = r#"{"fl_x": 1.0, "w": 2, "h": 2, "frames": [{"file_path": "a.png", "transform_matrix": [
            [0,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,1]]}]}"#;
        let err = parse_manifest(json, Path::new("")).unwrap_err();
        assert!(matches!(err, DataError::DegenerateTransform { index: 0 }));
    }
}
