//! PLY vertex data structures

use crate::types::Point;
use glam::Vec3;

/// Vertex data extracted from a PLY file before it becomes a seed point.
#[derive(Debug, Clone, PartialEq)]
pub struct PlyVertex {
    pub position: Vec3,
    pub color: Vec3,
    pub opacity: f32,
}

impl From<&PlyVertex> for Point {
    fn from(vertex: &PlyVertex) -> Self {
        Point::new(vertex.position, vertex.color)
    }
}
