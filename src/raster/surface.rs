use rayon::prelude::*;
use tracing::debug;

use crate::domain::{ElevationGrid, VectorFeature};
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::geometry::footprint_cells;

/// Derive feature heights from a surface model (DSM) over a terrain model (DTM).
///
/// For each feature, the mean positive `surface - terrain` difference over its
/// footprint cells is stored under `key`, in elevation units. Features with no
/// positive difference are left untouched. Both grids must share shape and
/// geotransform. Returns the number of annotated features.
pub fn annotate_feature_heights(
    features: &mut [VectorFeature],
    surface: &ElevationGrid,
    terrain: &ElevationGrid,
    key: &str,
    line_half_width: f64,
) -> PipelineResult<usize> {
    if surface.width() != terrain.width() || surface.height() != terrain.height() {
        return Err(PipelineError::mismatch(
            Stage::Surface,
            "surface grid",
            format!(
                "{}x{} surface does not match {}x{} terrain",
                surface.width(),
                surface.height(),
                terrain.width(),
                terrain.height()
            ),
        ));
    }
    if surface.transform() != terrain.transform() {
        return Err(PipelineError::mismatch(
            Stage::Surface,
            "surface grid",
            "geotransform differs from the terrain grid",
        ));
    }

    let transform = terrain.transform();
    let (width, height) = (terrain.width(), terrain.height());

    let annotated = features
        .par_iter_mut()
        .map(|feature| {
            let diffs: Vec<f64> = footprint_cells(&feature.geometry, transform, width, height, line_half_width)
                .into_iter()
                .filter_map(|cell| {
                    let (row, col) = (cell / width, cell % width);
                    let d = surface.get(row, col)? - terrain.get(row, col)?;
                    (d > 0.0).then_some(d)
                })
                .collect();

            if diffs.is_empty() {
                return 0;
            }
            let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
            feature.attributes.insert(key.to_string(), mean.to_string());
            1
        })
        .sum();

    debug!(annotated, features = features.len(), "derived feature heights from surface model");
    Ok(annotated)
}
