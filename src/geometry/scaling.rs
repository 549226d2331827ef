use rayon::prelude::*;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{ElevationGrid, GeoTransform};
use crate::error::{PipelineError, PipelineResult, Stage};

fn default_max_length() -> f64 {
    100.0
}
fn default_max_height() -> f64 {
    20.0
}
fn default_base_height() -> f64 {
    crate::config::heights::BASE_HEIGHT
}

/// Target physical size of the printed model, in mm
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PrintDimensions {
    /// Length of the longer horizontal side
    #[serde(default = "default_max_length")]
    pub max_length_mm: f64,
    /// Relief height from the lowest to the highest sample
    #[serde(default = "default_max_height")]
    pub max_height_mm: f64,
    /// Floor thickness under the lowest sample
    #[serde(default = "default_base_height")]
    pub base_height_mm: f64,
}

impl Default for PrintDimensions {
    fn default() -> Self {
        Self {
            max_length_mm: default_max_length(),
            max_height_mm: default_max_height(),
            base_height_mm: default_base_height(),
        }
    }
}

/// An elevation grid mapped into millimetre print space.
///
/// Each valid cell carries its physical (x, y, z); nodata cells are `None`.
#[derive(Debug, Clone)]
pub struct ScaledGrid {
    width: usize,
    height: usize,
    positions: Vec<Option<[f64; 3]>>,
    transform: GeoTransform,
    horizontal_scale: f64,
    vertical_scale: f64,
    elevation_range: (f64, f64),
    base_height_mm: f64,
}

impl ScaledGrid {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn position(&self, row: usize, col: usize) -> Option<[f64; 3]> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.positions[row * self.width + col]
    }

    /// Row-major physical positions
    pub fn positions(&self) -> &[Option<[f64; 3]>] {
        &self.positions
    }

    /// Source geotransform, for mapping CRS geometry onto cells
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Horizontal scale factor in mm per CRS unit (same for X and Y)
    pub fn horizontal_scale(&self) -> f64 {
        self.horizontal_scale
    }

    /// Vertical scale factor in mm per elevation unit.
    ///
    /// Flat input has no relief to normalise, so it falls back to the
    /// horizontal scale (true-scale heights).
    pub fn vertical_scale(&self) -> f64 {
        self.vertical_scale
    }

    /// (min, max) of the source elevations
    pub fn elevation_range(&self) -> (f64, f64) {
        self.elevation_range
    }

    pub fn base_height_mm(&self) -> f64 {
        self.base_height_mm
    }

    pub fn is_mirrored(&self) -> bool {
        self.transform.is_mirrored()
    }

    pub fn valid_count(&self) -> usize {
        self.positions.iter().filter(|p| p.is_some()).count()
    }
}

/// Map a grid into print space.
///
/// Horizontal: `s_xy = max_length / max(width * |cell_x|, height * |cell_y|)`,
/// applied to both axes, with the model oriented so +x and +y follow the CRS
/// axes. Vertical: the lowest valid sample lands at `base_height_mm` and the
/// highest at `base_height_mm + max_height_mm`.
pub fn scale(grid: &ElevationGrid, dims: &PrintDimensions) -> PipelineResult<ScaledGrid> {
    for (parameter, value) in [
        ("max_length_mm", dims.max_length_mm),
        ("max_height_mm", dims.max_height_mm),
        ("base_height_mm", dims.base_height_mm),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(PipelineError::DegenerateScale { parameter, value });
        }
    }

    let (e_min, e_max) = grid
        .value_range()
        .ok_or(PipelineError::EmptyGrid { stage: Stage::Scale })?;

    let transform = *grid.transform();
    let (width, height) = (grid.width(), grid.height());
    let cell_x = transform.cell_size_x.abs();
    let cell_y = transform.cell_size_y.abs();

    let span = (width as f64 * cell_x).max(height as f64 * cell_y);
    let s_xy = dims.max_length_mm / span;

    let relief = e_max - e_min;
    let vertical_scale = if relief > 0.0 {
        dims.max_height_mm / relief
    } else {
        s_xy
    };
    let base = dims.base_height_mm;
    let max_height = dims.max_height_mm;
    let z = |v: f64| {
        if relief > 0.0 {
            base + (v - e_min) / relief * max_height
        } else {
            base
        }
    };

    debug!(
        width,
        height,
        s_xy,
        e_min,
        e_max,
        "scaling grid to {:.1}mm x {:.1}mm",
        width as f64 * cell_x * s_xy,
        height as f64 * cell_y * s_xy
    );

    let positions = grid
        .values()
        .par_iter()
        .enumerate()
        .map(|(i, &v)| {
            if !grid.is_data(v) {
                return None;
            }
            let (row, col) = (i / width, i % width);
            let cx = if transform.cell_size_x > 0.0 {
                col as f64 + 0.5
            } else {
                (width - col) as f64 - 0.5
            };
            let cy = if transform.cell_size_y > 0.0 {
                row as f64 + 0.5
            } else {
                (height - row) as f64 - 0.5
            };
            Some([cx * cell_x * s_xy, cy * cell_y * s_xy, z(v)])
        })
        .collect();

    Ok(ScaledGrid {
        width,
        height,
        positions,
        transform,
        horizontal_scale: s_xy,
        vertical_scale,
        elevation_range: (e_min, e_max),
        base_height_mm: base,
    })
}
