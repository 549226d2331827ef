pub mod stl;
pub mod threemf;

use anyhow::Result;
use std::path::Path;

use crate::mesh::ExportedSolid;

pub use stl::{estimate_stl_size, write_stl};
pub use threemf::{write_3mf, write_3mf_to};

/// Container format, chosen from the output file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One object per layer
    ThreeMf,
    /// All layers merged into one triangle soup
    Stl,
}

impl ExportFormat {
    /// `.stl` selects STL; anything else is written as 3MF
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("stl") => ExportFormat::Stl,
            _ => ExportFormat::ThreeMf,
        }
    }
}

/// Write the model in the format implied by `path`
pub fn write_solid(path: &Path, solid: &ExportedSolid) -> Result<ExportFormat> {
    let format = ExportFormat::from_path(path);
    match format {
        ExportFormat::ThreeMf => write_3mf(path, solid)?,
        ExportFormat::Stl => write_stl(path, solid)?,
    }
    Ok(format)
}
