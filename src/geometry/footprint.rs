use geo::{Closest, ClosestPoint, Contains, Point};

use crate::domain::{FeatureGeometry, GeoTransform};

/// Cells of a `width` x `height` grid covered by a feature footprint.
///
/// A cell is covered when its centre lies inside an area geometry, or within
/// `line_half_width` CRS units of a line geometry. Returns row-major indices
/// in ascending order.
pub fn footprint_cells(
    geometry: &FeatureGeometry,
    transform: &GeoTransform,
    width: usize,
    height: usize,
    line_half_width: f64,
) -> Vec<usize> {
    let Some(mut extent) = geometry.extent() else {
        return Vec::new();
    };
    if let FeatureGeometry::Line(_) = geometry {
        extent.expand(&[
            (extent.min_x - line_half_width, extent.min_y - line_half_width),
            (extent.max_x + line_half_width, extent.max_y + line_half_width),
        ]);
    }

    let (c0, r0) = transform.cell_position(extent.min_x, extent.min_y);
    let (c1, r1) = transform.cell_position(extent.max_x, extent.max_y);
    let Some((col_lo, col_hi)) = index_window(c0, c1, width) else {
        return Vec::new();
    };
    let Some((row_lo, row_hi)) = index_window(r0, r1, height) else {
        return Vec::new();
    };

    let mut cells = Vec::new();
    for row in row_lo..=row_hi {
        for col in col_lo..=col_hi {
            let (x, y) = transform.cell_center(row, col);
            if covers(geometry, Point::new(x, y), line_half_width) {
                cells.push(row * width + col);
            }
        }
    }
    cells
}

fn covers(geometry: &FeatureGeometry, point: Point<f64>, line_half_width: f64) -> bool {
    match geometry {
        FeatureGeometry::Area(polygons) => polygons.contains(&point),
        FeatureGeometry::Line(lines) => match lines.closest_point(&point) {
            Closest::Intersection(_) => true,
            Closest::SinglePoint(p) => {
                (p.x() - point.x()).hypot(p.y() - point.y()) <= line_half_width
            }
            Closest::Indeterminate => false,
        },
    }
}

/// Clamp a fractional index span to valid cell indices
fn index_window(a: f64, b: f64, len: usize) -> Option<(usize, usize)> {
    let lo = a.min(b).floor();
    let hi = a.max(b).floor();
    if hi < 0.0 || lo >= len as f64 {
        return None;
    }
    Some((lo.max(0.0) as usize, (hi as usize).min(len - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiLineString, MultiPolygon, Polygon};

    fn square(x0: f64, y0: f64, size: f64) -> FeatureGeometry {
        let ring = LineString::from(vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ]);
        FeatureGeometry::Area(MultiPolygon::new(vec![Polygon::new(ring, vec![])]))
    }

    #[test]
    fn test_area_footprint_north_up() {
        // 4x4 grid of 1-unit cells, origin top-left at (0, 4)
        let transform = GeoTransform::new(0.0, 4.0, 1.0, -1.0);
        let cells = footprint_cells(&square(0.9, 0.9, 2.2), &transform, 4, 4, 0.0);

        // Centres (1.5, 1.5), (2.5, 1.5), (1.5, 2.5), (2.5, 2.5) -> rows 1..=2, cols 1..=2
        assert_eq!(cells, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_footprint_outside_grid() {
        let transform = GeoTransform::new(0.0, 0.0, 1.0, 1.0);
        let cells = footprint_cells(&square(50.0, 50.0, 5.0), &transform, 4, 4, 0.0);
        assert!(cells.is_empty());
    }

    #[test]
    fn test_line_corridor() {
        let transform = GeoTransform::new(0.0, 0.0, 1.0, 1.0);
        let line = FeatureGeometry::Line(MultiLineString::new(vec![LineString::from(vec![
            (0.0, 2.5),
            (5.0, 2.5),
        ])]));

        let cells = footprint_cells(&line, &transform, 5, 5, 0.6);

        // Row 2 lies on the line, rows 1 and 3 are 1.0 away
        assert_eq!(cells, vec![10, 11, 12, 13, 14]);

        let wide = footprint_cells(&line, &transform, 5, 5, 1.0);
        assert_eq!(wide.len(), 15);
    }
}
