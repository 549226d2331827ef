use geo::{BoundingRect, MultiLineString, MultiPolygon};
use std::collections::HashMap;

use crate::geometry::Extent;

/// Footprint geometry of an overlay feature, in the grid's CRS
#[derive(Debug, Clone)]
pub enum FeatureGeometry {
    Area(MultiPolygon<f64>),
    Line(MultiLineString<f64>),
}

impl FeatureGeometry {
    pub fn extent(&self) -> Option<Extent> {
        match self {
            FeatureGeometry::Area(polygons) => polygons.bounding_rect().map(Extent::from),
            FeatureGeometry::Line(lines) => lines.bounding_rect().map(Extent::from),
        }
    }
}

/// A vector feature with its attribute tags
#[derive(Debug, Clone)]
pub struct VectorFeature {
    pub geometry: FeatureGeometry,
    pub attributes: HashMap<String, String>,
}

impl VectorFeature {
    pub fn new(geometry: FeatureGeometry) -> Self {
        Self {
            geometry,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
