//! Pinhole camera with a camera-to-world pose.
//!
//! Poses follow the nerfstudio/OpenGL convention: the camera looks down its
//! local -Z axis with +Y up. Renderers that expect OpenCV axes flip Y and Z
//! when building their view matrix.

use glam::{Mat3, Mat4, Vec3, Vec4};

/// Pinhole intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl Intrinsics {
    /// Intrinsics with the principal point at the image center.
    pub fn centered(fx: f32, fy: f32, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
            width,
            height,
        }
    }
}

/// A training camera: stable dataset index, camera-to-world pose and intrinsics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Index of this camera in the training set. Pose corrections are keyed by it.
    pub index: usize,
    /// Camera-to-world rotation (columns are the camera axes in world space).
    pub rotation: Mat3,
    /// Camera center in world space.
    pub translation: Vec3,
    pub intrinsics: Intrinsics,
}

impl Camera {
    pub fn new(index: usize, rotation: Mat3, translation: Vec3, intrinsics: Intrinsics) -> Self {
        Self {
            index,
            rotation,
            translation,
            intrinsics,
        }
    }

    /// Build from a 4x4 camera-to-world matrix. The bottom row is ignored.
    pub fn from_matrix(index: usize, camera_to_world: Mat4, intrinsics: Intrinsics) -> Self {
        Self {
            index,
            rotation: Mat3::from_mat4(camera_to_world),
            translation: camera_to_world.w_axis.truncate(),
            intrinsics,
        }
    }

    /// Camera at `eye` looking towards `target`.
    pub fn looking_at(index: usize, eye: Vec3, target: Vec3, up: Vec3, intrinsics: Intrinsics) -> Self {
        let back = (eye - target).normalize_or_zero();
        let right = up.cross(back).normalize_or_zero();
        let true_up = back.cross(right);
        Self {
            index,
            rotation: Mat3::from_cols(right, true_up, back),
            translation: eye,
            intrinsics,
        }
    }

    /// Camera-to-world as a homogeneous matrix.
    pub fn camera_to_world(&self) -> Mat4 {
        Mat4::from_cols(
            self.rotation.x_axis.extend(0.0),
            self.rotation.y_axis.extend(0.0),
            self.rotation.z_axis.extend(0.0),
            Vec4::new(self.translation.x, self.translation.y, self.translation.z, 1.0),
        )
    }

    /// Copy with the same intrinsics and index but a different pose.
    pub fn with_pose(&self, rotation: Mat3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
            ..*self
        }
    }

    /// Copy with intrinsics and output size multiplied by `scaling_factor`.
    ///
    /// Sizes are truncated towards zero, matching how training datasets
    /// downscale their images.
    pub fn rescaled(&self, scaling_factor: f32) -> Self {
        let k = self.intrinsics;
        Self {
            intrinsics: Intrinsics {
                fx: k.fx * scaling_factor,
                fy: k.fy * scaling_factor,
                cx: k.cx * scaling_factor,
                cy: k.cy * scaling_factor,
                width: (k.width as f32 * scaling_factor) as u32,
                height: (k.height as f32 * scaling_factor) as u32,
            },
            ..*self
        }
    }

    /// Horizontal field of view in radians.
    pub fn fov_x(&self) -> f32 {
        2.0 * (self.intrinsics.width as f32 / (2.0 * self.intrinsics.fx)).atan()
    }

    /// Vertical field of view in radians.
    pub fn fov_y(&self) -> f32 {
        2.0 * (self.intrinsics.height as f32 / (2.0 * self.intrinsics.fy)).atan()
    }

    pub fn width(&self) -> u32 {
        self.intrinsics.width
    }

    pub fn height(&self) -> u32 {
        self.intrinsics.height
    }
}
