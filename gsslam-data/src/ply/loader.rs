//! PLY file loading functions

use crate::error::DataError;
use crate::ply::PlyVertex;
use crate::types::Point;
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

type VertexProperties = HashMap<String, JsonValue>;

// Only the vertex element matters for seeding; faces are skipped.
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<VertexProperties>,
}

/// Load vertices from a PLY file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_vertices_from_ply(path: impl AsRef<Path>) -> Result<Vec<PlyVertex>, DataError> {
    debug!("Loading PLY vertices");
    let file = File::open(path.as_ref())?;
    parse_vertices(file)
}

/// Load seed points (position + color) from a PLY file.
pub fn load_points_from_ply(path: impl AsRef<Path>) -> Result<Vec<Point>, DataError> {
    Ok(load_vertices_from_ply(path)?
        .iter()
        .map(Point::from)
        .collect())
}

/// Parse PLY vertices from any reader.
pub fn parse_vertices<R: Read>(reader: R) -> Result<Vec<PlyVertex>, DataError> {
    let ply_data: PlyFile = serde_ply::from_reader(BufReader::new(reader)).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        DataError::Ply(e.to_string())
    })?;

    info!("PLY file parsed: {} vertices", ply_data.vertex.len());

    let vertices = ply_data
        .vertex
        .iter()
        .enumerate()
        .map(|(i, props)| vertex_from_properties(i, props))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Loaded {} vertices from PLY file", vertices.len());
    Ok(vertices)
}

fn get_f32(prop: Option<&JsonValue>) -> Option<f32> {
    prop.and_then(|v| match v {
        JsonValue::Number(n) => n.as_f64().map(|f| f as f32),
        _ => None,
    })
}

fn get_u8(prop: Option<&JsonValue>) -> Option<u8> {
    prop.and_then(|v| match v {
        JsonValue::Number(n) => n
            .as_u64()
            .map(|u| u as u8)
            .or_else(|| n.as_i64().map(|i| i as u8)),
        _ => None,
    })
}

fn rgb(props: &VertexProperties, r: &str, g: &str, b: &str) -> Option<Vec3> {
    match (get_u8(props.get(r)), get_u8(props.get(g)), get_u8(props.get(b))) {
        (Some(r), Some(g), Some(b)) => Some(Vec3::new(r as f32, g as f32, b as f32) / 255.0),
        _ => None,
    }
}

fn vertex_from_properties(index: usize, props: &VertexProperties) -> Result<PlyVertex, DataError> {
    let coord = |property: &'static str| {
        get_f32(props.get(property)).ok_or(DataError::MissingProperty { property, index })
    };
    let position = Vec3::new(coord("x")?, coord("y")?, coord("z")?);

    let color = rgb(props, "red", "green", "blue")
        .or_else(|| rgb(props, "r", "g", "b"))
        .unwrap_or(Vec3::splat(0.8));

    // Splat exports store opacity as a logit.
    let raw_opacity = get_f32(props.get("opacity"))
        .or_else(|| get_f32(props.get("alpha")))
        .unwrap_or(1.0);
    let opacity = if (0.0..=1.0).contains(&raw_opacity) {
        raw_opacity
    } else {
        (1.0 / (1.0 + (-raw_opacity).exp())).clamp(0.0, 1.0)
    };

    Ok(PlyVertex {
        position,
        color,
        opacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: JsonValue) -> VertexProperties {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_vertex_with_full_color_names() {
        let p = props(json!({"x": 1.0, "y": 2.0, "z": 3.0, "red": 255, "green": 0, "blue": 51}));
        let v = vertex_from_properties(0, &p).unwrap();
        assert_eq!(v.position, Vec3::new(1.0, 2.0, 3.0));
        assert!((v.color - Vec3::new(1.0, 0.0, 0.2)).length() < 1e-6);
        assert_eq!(v.opacity, 1.0);
    }

    #[test]
    fn test_vertex_with_short_color_names_and_logit_opacity() {
        let p = props(json!({"x": 0.0, "y": 0.0, "z": 0.0, "r": 0, "g": 255, "b": 0, "opacity": 4.0}));
        let v = vertex_from_properties(0, &p).unwrap();
        assert_eq!(v.color, Vec3::new(0.0, 1.0, 0.0));
        assert!(v.opacity > 0.98 && v.opacity <= 1.0);
    }

    #[test]
    fn test_vertex_without_color_defaults_to_grey() {
        let p = props(json!({"x": 0.0, "y": 0.0, "z": 0.0}));
        let v = vertex_from_properties(0, &p).unwrap();
        assert_eq!(v.color, Vec3::splat(0.8));
    }

    #[test]
    fn test_vertex_missing_coordinate_is_reported() {
        let p = props(json!({"x": 0.0, "z": 0.0}));
        let err = vertex_from_properties(7, &p).unwrap_err();
        assert!(matches!(
            err,
            DataError::MissingProperty { property: "y", index: 7 }
        ));
    }
}
