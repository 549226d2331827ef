//! File readers standing in for the raster and vector source collaborators

pub mod ascii_grid;
pub mod geojson;

pub use ascii_grid::read_ascii_grid;
pub use geojson::{read_boundary, read_features};
