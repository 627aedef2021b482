//! Core data types for seed points and Gaussian primitives.
//!
//! These are CPU-side representations. The scene model owns a `Vec<Gaussian>`
//! and everything downstream (projection, covisibility, rendering) reads them
//! by index.

use glam::{Mat3, Quat, Vec3};

/// A simple colored point in 3D space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Position in world space.
    pub position: Vec3,
    /// RGB color (linear, 0-1 range).
    pub color: Vec3,
}

impl Point {
    /// Create a new point with position and color.
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Create a white point at the given position.
    pub fn white(position: Vec3) -> Self {
        Self {
            position,
            color: Vec3::ONE,
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::splat(0.8),
        }
    }
}

/// A 3D Gaussian splat (CPU representation).
///
/// An anisotropic Gaussian with position, orientation, linear per-axis scale,
/// color and opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    /// Center position in world space.
    pub position: Vec3,
    /// Rotation quaternion (x, y, z, w). Not required to be normalized.
    pub rotation: [f32; 4],
    /// Per-axis standard deviation (x, y, z).
    pub scale: Vec3,
    /// RGB color (linear, 0-1 range).
    pub color: Vec3,
    /// Opacity (0-1).
    pub opacity: f32,
}

impl Gaussian {
    /// Create a new Gaussian with all parameters.
    pub fn new(position: Vec3, rotation: [f32; 4], scale: Vec3, color: Vec3, opacity: f32) -> Self {
        Self {
            position,
            rotation,
            scale,
            color,
            opacity,
        }
    }

    /// Create a Gaussian from a point with default scale and rotation.
    pub fn from_point(point: &Point, scale: f32) -> Self {
        Self {
            position: point.position,
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: Vec3::splat(scale),
            color: point.color,
            opacity: 1.0,
        }
    }

    /// Create a spherical Gaussian (uniform scale).
    pub fn spherical(position: Vec3, radius: f32, color: Vec3, opacity: f32) -> Self {
        Self {
            position,
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: Vec3::splat(radius),
            color,
            opacity,
        }
    }

    /// Normalized orientation. A zero quaternion falls back to identity.
    pub fn orientation(&self) -> Quat {
        let [x, y, z, w] = self.rotation;
        let q = Quat::from_xyzw(x, y, z, w);
        if q.length_squared() <= f32::EPSILON {
            Quat::IDENTITY
        } else {
            q.normalize()
        }
    }

    /// World-space covariance `R S Sᵀ Rᵀ`.
    pub fn covariance(&self) -> Mat3 {
        let m = Mat3::from_quat(self.orientation()) * Mat3::from_diagonal(self.scale);
        m * m.transpose()
    }
}

impl Default for Gaussian {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: Vec3::splat(0.01),
            color: Vec3::splat(0.8),
            opacity: 1.0,
        }
    }
}

impl From<&Point> for Gaussian {
    fn from(point: &Point) -> Self {
        Self::from_point(point, 0.01)
    }
}
