use crate::error::{PipelineError, PipelineResult, Stage};
use crate::geometry::Extent;

/// Affine mapping from cell indices to CRS coordinates.
///
/// `origin` is the outer corner of cell (0, 0). Cell sizes may be negative to
/// flip an axis; north-up rasters carry a negative `cell_size_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_size_x: f64,
    pub cell_size_y: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, cell_size_x: f64, cell_size_y: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            cell_size_x,
            cell_size_y,
        }
    }

    /// CRS coordinates of the centre of a cell
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.cell_size_x,
            self.origin_y + (row as f64 + 0.5) * self.cell_size_y,
        )
    }

    /// Fractional (col, row) position of a CRS point
    pub fn cell_position(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.cell_size_x,
            (y - self.origin_y) / self.cell_size_y,
        )
    }

    /// Extent covered by a grid of the given size
    pub fn extent(&self, width: usize, height: usize) -> Extent {
        Extent::new(
            self.origin_x,
            self.origin_y,
            self.origin_x + width as f64 * self.cell_size_x,
            self.origin_y + height as f64 * self.cell_size_y,
        )
    }

    /// Whether increasing column and row indices form a mirrored (left-handed) frame
    pub fn is_mirrored(&self) -> bool {
        (self.cell_size_x < 0.0) != (self.cell_size_y < 0.0)
    }
}

/// A rectangular, row-major grid of elevation samples
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    width: usize,
    height: usize,
    values: Vec<f64>,
    nodata: f64,
    transform: GeoTransform,
    crs: Option<String>,
}

impl ElevationGrid {
    /// Create a grid, checking its shape and cell size
    pub fn new(
        width: usize,
        height: usize,
        values: Vec<f64>,
        nodata: f64,
        transform: GeoTransform,
    ) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::mismatch(
                Stage::Compose,
                "grid",
                format!("dimensions must be at least 1x1, got {width}x{height}"),
            ));
        }
        if values.len() != width * height {
            return Err(PipelineError::mismatch(
                Stage::Compose,
                "grid",
                format!(
                    "{} values supplied for a {width}x{height} grid",
                    values.len()
                ),
            ));
        }
        let sizes = [transform.cell_size_x, transform.cell_size_y];
        if sizes.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(PipelineError::mismatch(
                Stage::Compose,
                "grid",
                format!(
                    "cell size must be finite and non-zero, got ({}, {})",
                    transform.cell_size_x, transform.cell_size_y
                ),
            ));
        }

        Ok(Self {
            width,
            height,
            values,
            nodata,
            transform,
            crs: None,
        })
    }

    /// Attach a coordinate reference tag
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn extent(&self) -> Extent {
        self.transform.extent(self.width, self.height)
    }

    /// True when `value` is a real sample rather than the nodata sentinel
    pub fn is_data(&self, value: f64) -> bool {
        !value.is_nan() && value != self.nodata
    }

    /// Value at (row, col), or `None` for nodata and out-of-range cells
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let value = self.values[row * self.width + col];
        self.is_data(value).then_some(value)
    }

    /// Value of the cell containing the CRS point (x, y)
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let (col, row) = self.transform.cell_position(x, y);
        let (col, row) = (col.floor(), row.floor());
        if col < 0.0 || row < 0.0 {
            return None;
        }
        self.get(row as usize, col as usize)
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|&&v| self.is_data(v)).count()
    }

    /// Min and max over valid cells
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|&v| self.is_data(v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Same shape, transform and CRS with new cell values
    pub(crate) fn with_values(&self, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.values.len());
        Self {
            width: self.width,
            height: self.height,
            values,
            nodata: self.nodata,
            transform: self.transform,
            crs: self.crs.clone(),
        }
    }
}
