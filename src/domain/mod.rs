pub mod boundary;
pub mod feature;
pub mod grid;
pub mod tags;

pub use boundary::{Boundary, FillRule};
pub use feature::{FeatureGeometry, VectorFeature};
pub use grid::{ElevationGrid, GeoTransform};
pub use tags::{PredicateSet, TagGroup, TagValue, assign_group};
