use rayon::prelude::*;
use tracing::info;

use crate::domain::{Boundary, ElevationGrid, FillRule};
use crate::error::{PipelineError, PipelineResult};

/// Mask a grid to a boundary polygon.
///
/// A cell is kept iff its centre point is inside `boundary` under `rule`;
/// this approximates true area coverage at cell resolution. Cells outside are
/// set to nodata. Shape, geotransform and CRS are unchanged. Fails when no
/// cell holding data is inside.
pub fn clip(grid: &ElevationGrid, boundary: &Boundary, rule: FillRule) -> PipelineResult<ElevationGrid> {
    let width = grid.width();
    let transform = grid.transform();
    let nodata = grid.nodata();

    let masked: Vec<(f64, bool)> = grid
        .values()
        .par_iter()
        .enumerate()
        .map(|(i, &v)| {
            let (x, y) = transform.cell_center(i / width, i % width);
            if boundary.contains(x, y, rule) {
                (v, grid.is_data(v))
            } else {
                (nodata, false)
            }
        })
        .collect();

    let inside = masked.iter().filter(|(_, hit)| *hit).count();
    if inside == 0 {
        return Err(PipelineError::EmptyIntersection {
            cells: masked.len(),
        });
    }

    let clipped = grid.with_values(masked.into_iter().map(|(v, _)| v).collect());
    info!(
        inside,
        valid = clipped.valid_count(),
        "clipped grid to boundary"
    );
    Ok(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GeoTransform;

    fn grid_4x4() -> ElevationGrid {
        ElevationGrid::new(
            4,
            4,
            (0..16).map(f64::from).collect(),
            -1.0,
            GeoTransform::new(0.0, 0.0, 1.0, 1.0),
        )
        .unwrap()
    }

    fn square(x0: f64, y0: f64, size: f64) -> Boundary {
        Boundary::from_rings(vec![vec![vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ]]])
        .unwrap()
    }

    #[test]
    fn test_clip_keeps_inside_cells() {
        let grid = grid_4x4();
        let clipped = clip(&grid, &square(1.0, 1.0, 2.0), FillRule::EvenOdd).unwrap();

        assert_eq!(clipped.valid_count(), 4);
        assert_eq!(clipped.get(1, 1), Some(5.0));
        assert_eq!(clipped.get(2, 2), Some(10.0));
        assert_eq!(clipped.get(0, 0), None);
        assert_eq!(clipped.transform(), grid.transform());
        assert_eq!((clipped.width(), clipped.height()), (4, 4));
    }

    #[test]
    fn test_boundary_over_nodata_only_is_error() {
        let mut values: Vec<f64> = (0..16).map(f64::from).collect();
        for v in &mut values[..8] {
            *v = -1.0;
        }
        let grid = grid_4x4().with_values(values);

        // Covers only the two bottom rows, which hold no data
        let err = clip(&grid, &square(0.0, 0.0, 2.0), FillRule::EvenOdd).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyIntersection { .. }));

        let clipped = clip(&grid, &square(0.0, 1.0, 2.0), FillRule::EvenOdd).unwrap();
        assert_eq!(clipped.valid_count(), 2);
    }

    #[test]
    fn test_clip_outside_is_error() {
        let grid = grid_4x4();
        let err = clip(&grid, &square(100.0, 100.0, 5.0), FillRule::EvenOdd).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyIntersection { cells: 16 }));
    }
}
