pub mod overlay;
pub mod terrain;

pub use overlay::layer;
pub use terrain::{TERRAIN_LAYER, TERRAIN_NAME, triangulate};
