//! terramesh - Turn elevation rasters and vector overlays into watertight,
//! 3D-printable terrain models

pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod geometry;
pub mod layers;
pub mod mesh;
pub mod pipeline;
pub mod raster;
pub mod source;

pub use error::{PipelineError, PipelineResult, Stage};
pub use pipeline::{PipelineInput, PipelineOutput, PipelineStats, run};
