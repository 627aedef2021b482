//! gsslam Data Crate
//!
//! Data types and loaders shared by the gsslam training crates: seed points,
//! Gaussian primitives, pinhole cameras, PLY point clouds and nerfstudio-style
//! `transforms.json` manifests.
//! This crate is renderer-agnostic and does no image decoding.

pub mod camera;
pub mod error;
pub mod ply;
pub mod transforms;
pub mod types;

pub use camera::{Camera, Intrinsics};
pub use error::DataError;
pub use ply::{PlyVertex, load_points_from_ply, load_vertices_from_ply};
pub use transforms::{Manifest, ManifestFrame, load_manifest, parse_manifest};
pub use types::{Gaussian, Point};
