pub mod assembly;
pub mod component;
pub mod heightfield;
pub mod validation;

pub use assembly::{ExportedSolid, Unit, UpAxis, assemble};
pub use component::{MeshComponent, Triangle};
pub use heightfield::{SolidField, SolidSample, build_solid};
pub use validation::{ValidationResult, remove_degenerate, validate_component};
