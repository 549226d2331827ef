use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{ElevationGrid, GeoTransform};
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::geometry::Extent;

/// Relative tolerance when comparing cell sizes between tiles
const CELL_SIZE_TOLERANCE: f64 = 1e-9;

/// Fraction of a cell within which an extent edge counts as on a cell edge
const LATTICE_TOLERANCE: f64 = 1e-6;

/// Options for [`compose`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeOptions {
    /// Area to cover; the union of all tile extents when `None`
    pub target_extent: Option<Extent>,
    /// Accept output cells that no tile covers (left as nodata)
    pub allow_partial_coverage: bool,
}

/// Merge tiles into one grid covering the target extent.
///
/// A target extent is grown outward to the first tile's cell edges. Tiles
/// must share a cell size. Output cells take the value of the first
/// tile, in list order, holding data at the cell centre; later tiles never
/// overwrite a resolved cell, so callers control seam priority by ordering.
/// The output inherits the first tile's nodata sentinel, axis directions and
/// CRS tag.
pub fn compose(tiles: &[ElevationGrid], options: &ComposeOptions) -> PipelineResult<ElevationGrid> {
    let first = tiles.first().ok_or(PipelineError::NoTiles {
        stage: Stage::Compose,
    })?;
    check_tiles_consistent(tiles)?;

    let reference = *first.transform();
    let cell_x = reference.cell_size_x.abs();
    let cell_y = reference.cell_size_y.abs();

    let extent = match options.target_extent {
        Some(extent) => snap_to_lattice(&extent, &reference),
        None => tiles
            .iter()
            .map(ElevationGrid::extent)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| first.extent()),
    };

    let width = cell_count(extent.width(), cell_x);
    let height = cell_count(extent.height(), cell_y);
    let transform = GeoTransform::new(
        if reference.cell_size_x > 0.0 {
            extent.min_x
        } else {
            extent.max_x
        },
        if reference.cell_size_y > 0.0 {
            extent.min_y
        } else {
            extent.max_y
        },
        reference.cell_size_x,
        reference.cell_size_y,
    );

    debug!(
        tiles = tiles.len(),
        width, height, "compositing tiles onto output grid"
    );

    let nodata = first.nodata();
    let mut values = vec![nodata; width * height];
    values.par_iter_mut().enumerate().for_each(|(i, cell)| {
        let (x, y) = transform.cell_center(i / width, i % width);
        if let Some(v) = tiles.iter().find_map(|tile| tile.sample(x, y)) {
            *cell = v;
        }
    });

    let composed = ElevationGrid::new(width, height, values, nodata, transform)?;
    let composed = match first.crs() {
        Some(crs) => composed.with_crs(crs),
        None => composed,
    };

    let total = width * height;
    let missing = total - composed.valid_count();
    if missing > 0 && !options.allow_partial_coverage {
        return Err(PipelineError::Coverage { missing, total });
    }

    info!(width, height, missing, "composited {} tiles", tiles.len());
    Ok(composed)
}

fn check_tiles_consistent(tiles: &[ElevationGrid]) -> PipelineResult<()> {
    let first = &tiles[0];
    let (ref_x, ref_y) = (
        first.transform().cell_size_x.abs(),
        first.transform().cell_size_y.abs(),
    );

    for (index, tile) in tiles.iter().enumerate().skip(1) {
        let (cx, cy) = (
            tile.transform().cell_size_x.abs(),
            tile.transform().cell_size_y.abs(),
        );
        if !same_size(cx, ref_x) || !same_size(cy, ref_y) {
            return Err(PipelineError::mismatch(
                Stage::Compose,
                format!("tile {index}"),
                format!("cell size ({cx}, {cy}) differs from tile 0 ({ref_x}, {ref_y})"),
            ));
        }
        if let (Some(a), Some(b)) = (first.crs(), tile.crs())
            && a != b
        {
            return Err(PipelineError::mismatch(
                Stage::Compose,
                format!("tile {index}"),
                format!("CRS '{b}' differs from tile 0 '{a}'"),
            ));
        }
    }
    Ok(())
}

/// Grow `extent` outward to the nearest cell edges of `reference`, so output
/// cell centres coincide with tile cell centres
fn snap_to_lattice(extent: &Extent, reference: &GeoTransform) -> Extent {
    let snap = |lo: f64, hi: f64, origin: f64, cell: f64| {
        let first = ((lo - origin) / cell + LATTICE_TOLERANCE).floor();
        let last = ((hi - origin) / cell - LATTICE_TOLERANCE).ceil().max(first + 1.0);
        (origin + first * cell, origin + last * cell)
    };
    let (min_x, max_x) = snap(
        extent.min_x,
        extent.max_x,
        reference.origin_x,
        reference.cell_size_x.abs(),
    );
    let (min_y, max_y) = snap(
        extent.min_y,
        extent.max_y,
        reference.origin_y,
        reference.cell_size_y.abs(),
    );
    Extent::new(min_x, min_y, max_x, max_y)
}

fn same_size(a: f64, b: f64) -> bool {
    (a - b).abs() <= CELL_SIZE_TOLERANCE * a.max(b)
}

/// Number of cells needed to span `length`, tolerating float noise
fn cell_count(length: f64, cell: f64) -> usize {
    let n = length / cell;
    let n = if (n - n.round()).abs() < 1e-6 {
        n.round()
    } else {
        n.ceil()
    };
    (n as usize).max(1)
}
