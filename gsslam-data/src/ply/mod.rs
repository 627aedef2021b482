//! PLY seed point loading

mod loader;
mod vertex;

pub use loader::{load_points_from_ply, load_vertices_from_ply, parse_vertices};
pub use vertex::PlyVertex;
