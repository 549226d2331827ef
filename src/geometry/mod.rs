pub mod extent;
pub mod footprint;
pub mod scaling;

pub use extent::Extent;
pub use footprint::footprint_cells;
pub use scaling::{PrintDimensions, ScaledGrid, scale};
