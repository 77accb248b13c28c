//! GeoJSON annotation loading.
//!
//! Only the `features[*].geometry` members are read. Coordinates are taken
//! as level-0 pixel positions; extra position members (such as a Z value)
//! are ignored.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::AnnotationError;

/// A closed ring of `(x, y)` positions.
pub type Ring = Vec<(f64, f64)>;

/// An annotation geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Exterior ring followed by holes
    Polygon(Vec<Ring>),

    /// Member polygons, each exterior ring followed by holes
    MultiPolygon(Vec<Vec<Ring>>),

    /// Any other geometry type, by name; never rasterized
    Other(String),
}

impl Geometry {
    /// GeoJSON type name.
    pub fn kind(&self) -> &str {
        match self {
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::Other(kind) => kind.as_str(),
        }
    }

    /// Exterior rings: one for a polygon, one per member of a multipolygon.
    pub fn exterior_rings(&self) -> Vec<&Ring> {
        match self {
            Geometry::Polygon(rings) => rings.first().into_iter().collect(),
            Geometry::MultiPolygon(polygons) => {
                polygons.iter().filter_map(|rings| rings.first()).collect()
            }
            Geometry::Other(_) => Vec::new(),
        }
    }

    /// `(min_x, min_y, max_x, max_y)` over the exterior rings.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.exterior_rings()
            .into_iter()
            .flatten()
            .fold(None, |acc, &(x, y)| {
                Some(match acc {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                })
            })
    }
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

fn invalid(feature: usize, message: impl Into<String>) -> AnnotationError {
    AnnotationError::InvalidCoordinates {
        feature,
        message: message.into(),
    }
}

fn parse_position(value: &Value, feature: usize) -> Result<(f64, f64), AnnotationError> {
    let members = value
        .as_array()
        .ok_or_else(|| invalid(feature, format!("position {} is not an array", value)))?;
    if members.len() < 2 {
        return Err(invalid(feature, format!("position {} has fewer than 2 values", value)));
    }
    let x = members[0]
        .as_f64()
        .ok_or_else(|| invalid(feature, format!("non-numeric x in {}", value)))?;
    let y = members[1]
        .as_f64()
        .ok_or_else(|| invalid(feature, format!("non-numeric y in {}", value)))?;
    Ok((x, y))
}

fn parse_ring(value: &Value, feature: usize) -> Result<Ring, AnnotationError> {
    value
        .as_array()
        .ok_or_else(|| invalid(feature, "ring is not an array of positions"))?
        .iter()
        .map(|position| parse_position(position, feature))
        .collect()
}

fn parse_polygon(value: &Value, feature: usize) -> Result<Vec<Ring>, AnnotationError> {
    value
        .as_array()
        .ok_or_else(|| invalid(feature, "polygon is not an array of rings"))?
        .iter()
        .map(|ring| parse_ring(ring, feature))
        .collect()
}

fn parse_geometry(raw: RawGeometry, feature: usize) -> Result<Geometry, AnnotationError> {
    match raw.kind.as_str() {
        "Polygon" => Ok(Geometry::Polygon(parse_polygon(&raw.coordinates, feature)?)),
        "MultiPolygon" => {
            let polygons = raw
                .coordinates
                .as_array()
                .ok_or_else(|| invalid(feature, "multipolygon is not an array of polygons"))?
                .iter()
                .map(|polygon| parse_polygon(polygon, feature))
                .collect::<Result<_, _>>()?;
            Ok(Geometry::MultiPolygon(polygons))
        }
        _ => Ok(Geometry::Other(raw.kind)),
    }
}

/// Parse a GeoJSON document into one geometry per feature.
///
/// Features without a geometry become `Geometry::Other("null")`.
pub fn parse_annotations(text: &str) -> Result<Vec<Geometry>, AnnotationError> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| AnnotationError::Json(e.to_string()))?;
    let features = document
        .get("features")
        .and_then(Value::as_array)
        .ok_or(AnnotationError::MissingFeatures)?;

    features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let raw: RawFeature = serde_json::from_value(feature.clone())
                .map_err(|e| AnnotationError::Json(format!("feature {}: {}", index, e)))?;
            match raw.geometry {
                Some(geometry) => parse_geometry(geometry, index),
                None => Ok(Geometry::Other("null".to_string())),
            }
        })
        .collect()
}

/// Read and parse a GeoJSON file.
pub async fn load_annotations(path: impl AsRef<Path>) -> Result<Vec<Geometry>, AnnotationError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AnnotationError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    parse_annotations(&text)
}
