pub mod clip;
pub mod compositor;
pub mod surface;

pub use clip::clip;
pub use compositor::{ComposeOptions, compose};
pub use surface::annotate_feature_heights;
