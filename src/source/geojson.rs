use anyhow::{Context, Result, bail};
use geo::{LineString, MultiLineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::domain::{Boundary, FeatureGeometry, VectorFeature};

/// A GeoJSON document: a FeatureCollection or a single Feature
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Collection { features: Vec<Feature> },
    Single(Feature),
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
}

/// Positions may carry a third (elevation) coordinate, which is ignored
type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    #[serde(other)]
    Unsupported,
}

impl Document {
    fn into_features(self) -> Vec<Feature> {
        match self {
            Document::Collection { features } => features,
            Document::Single(feature) => vec![feature],
        }
    }
}

fn parse_document(contents: &str) -> Result<Vec<Feature>> {
    let document: Document = serde_json::from_str(contents).context("Invalid GeoJSON")?;
    Ok(document.into_features())
}

fn points(ring: &[Position]) -> Result<Vec<(f64, f64)>> {
    ring.iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            _ => bail!("position needs at least two coordinates, got {}", p.len()),
        })
        .collect()
}

fn rings(polygon: &[Vec<Position>]) -> Result<Vec<Vec<(f64, f64)>>> {
    polygon.iter().map(|ring| points(ring)).collect()
}

fn polygon(rings: Vec<Vec<(f64, f64)>>) -> Option<Polygon<f64>> {
    let mut rings = rings.into_iter().map(LineString::from);
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

/// Read a clip boundary from every Polygon and MultiPolygon in a GeoJSON file
pub fn read_boundary(path: &Path) -> Result<Boundary> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read boundary: {}", path.display()))?;
    parse_boundary(&contents).with_context(|| format!("Invalid boundary: {}", path.display()))
}

pub fn parse_boundary(contents: &str) -> Result<Boundary> {
    let mut polygons = Vec::new();
    for feature in parse_document(contents)? {
        match feature.geometry {
            Some(Geometry::Polygon { coordinates }) => polygons.push(rings(&coordinates)?),
            Some(Geometry::MultiPolygon { coordinates }) => {
                for p in &coordinates {
                    polygons.push(rings(p)?);
                }
            }
            _ => {}
        }
    }
    if polygons.is_empty() {
        bail!("no Polygon or MultiPolygon geometry found");
    }
    Ok(Boundary::from_rings(polygons)?)
}

/// Read overlay features (areas and lines) with their properties as tags
pub fn read_features(path: &Path) -> Result<Vec<VectorFeature>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read features: {}", path.display()))?;
    let features = parse_features(&contents)
        .with_context(|| format!("Invalid features: {}", path.display()))?;
    debug!(path = %path.display(), features = features.len(), "read vector features");
    Ok(features)
}

pub fn parse_features(contents: &str) -> Result<Vec<VectorFeature>> {
    let mut features = Vec::new();
    let mut skipped = 0;

    for feature in parse_document(contents)? {
        let geometry = match feature.geometry {
            Some(Geometry::Polygon { coordinates }) => {
                FeatureGeometry::Area(polygon(rings(&coordinates)?).into_iter().collect())
            }
            Some(Geometry::MultiPolygon { coordinates }) => {
                let mut polygons = Vec::new();
                for p in &coordinates {
                    polygons.extend(polygon(rings(p)?));
                }
                FeatureGeometry::Area(MultiPolygon::new(polygons))
            }
            Some(Geometry::LineString { coordinates }) => FeatureGeometry::Line(
                MultiLineString::new(vec![LineString::from(points(&coordinates)?)]),
            ),
            Some(Geometry::MultiLineString { coordinates }) => {
                let lines = coordinates
                    .iter()
                    .map(|line| points(line).map(LineString::from))
                    .collect::<Result<Vec<_>>>()?;
                FeatureGeometry::Line(MultiLineString::new(lines))
            }
            Some(Geometry::Unsupported) | None => {
                skipped += 1;
                continue;
            }
        };

        features.push(VectorFeature {
            geometry,
            attributes: feature.properties.map(tags).unwrap_or_default(),
        });
    }

    if skipped > 0 {
        debug!(skipped, "skipped features without area or line geometry");
    }
    Ok(features)
}

/// Flatten JSON properties into string tags; nulls are dropped
fn tags(properties: serde_json::Map<String, Value>) -> HashMap<String, String> {
    properties
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FillRule;
    use crate::error::PipelineError;

    const FEATURES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "building": "yes", "height": 12.5, "name": null },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "highway": "primary", "lanes": 2 },
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[0, 0, 410.0], [10, 10, 412.0]]
                }
            },
            {
                "type": "Feature",
                "properties": { "amenity": "bench" },
                "geometry": { "type": "Point", "coordinates": [1, 1] }
            }
        ]
    }"#;

    #[test]
    fn test_parse_features() {
        let features = parse_features(FEATURES).unwrap();

        assert_eq!(features.len(), 2);
        assert!(matches!(features[0].geometry, FeatureGeometry::Area(_)));
        assert_eq!(features[0].attributes["building"], "yes");
        assert_eq!(features[0].attributes["height"], "12.5");
        assert!(!features[0].attributes.contains_key("name"));

        assert!(matches!(features[1].geometry, FeatureGeometry::Line(_)));
        assert_eq!(features[1].attributes["lanes"], "2");
    }

    #[test]
    fn test_parse_boundary_multipolygon() {
        let text = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]],
                    [[[5, 5], [7, 5], [7, 7], [5, 7], [5, 5]]]
                ]
            }
        }"#;
        let boundary = parse_boundary(text).unwrap();

        assert_eq!(boundary.polygons().0.len(), 2);
        assert!(boundary.contains(6.0, 6.0, FillRule::EvenOdd));
        assert!(!boundary.contains(4.0, 4.0, FillRule::EvenOdd));
    }

    #[test]
    fn test_unclosed_boundary_is_malformed() {
        let text = r#"{
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2]]] }
        }"#;
        let err = parse_boundary(text).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MalformedBoundary { .. })
        ));
    }

    #[test]
    fn test_boundary_without_polygons() {
        let err = parse_boundary(FEATURES.replace("Polygon", "Point").as_str()).unwrap_err();
        assert!(err.to_string().contains("no Polygon"));
    }
}
