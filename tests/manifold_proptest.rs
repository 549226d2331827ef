//! Property-based tests for the closed-solid guarantee.
//!
//! Random grids with random nodata holes and axis directions must always
//! triangulate into closed, consistently wound solids.

use proptest::prelude::*;
use terramesh::config::OverlayConfig;
use terramesh::domain::{ElevationGrid, FeatureGeometry, GeoTransform, PredicateSet, TagGroup, VectorFeature};
use terramesh::geometry::{PrintDimensions, scale};
use terramesh::layers::{layer, triangulate};
use terramesh::mesh::validate_component;

const NODATA: f64 = -9999.0;

/// (width, height, values with holes, x axis sign, y axis sign)
fn arb_grid() -> impl Strategy<Value = (usize, usize, Vec<f64>, bool, bool)> {
    (1usize..9, 1usize..9).prop_flat_map(|(w, h)| {
        let cell = prop_oneof![3 => (0.0..1000.0f64), 1 => Just(NODATA)];
        (
            Just(w),
            Just(h),
            prop::collection::vec(cell, w * h),
            any::<bool>(),
            any::<bool>(),
        )
    })
}

fn build_grid(w: usize, h: usize, values: Vec<f64>, flip_x: bool, flip_y: bool) -> ElevationGrid {
    let cx = if flip_x { -10.0 } else { 10.0 };
    let cy = if flip_y { -10.0 } else { 10.0 };
    ElevationGrid::new(w, h, values, NODATA, GeoTransform::new(0.0, 0.0, cx, cy)).unwrap()
}

proptest! {
    #[test]
    fn proptest_terrain_is_closed((w, h, values, fx, fy) in arb_grid()) {
        let grid = build_grid(w, h, values, fx, fy);
        prop_assume!(grid.valid_count() > 0);

        let scaled = scale(&grid, &PrintDimensions::default()).unwrap();
        let mesh = triangulate(&scaled).unwrap();
        let report = validate_component(&mesh);

        prop_assert!(report.is_printable(), "{}", report.summary());
        if !mesh.is_empty() {
            prop_assert!(report.volume > 0.0);
        }
    }

    #[test]
    fn proptest_overlay_is_closed(
        (w, h, values, fx, fy) in arb_grid(),
        x0 in -20.0..60.0f64,
        y0 in -20.0..60.0f64,
        size in 5.0..60.0f64,
    ) {
        let grid = build_grid(w, h, values, fx, fy);
        prop_assume!(grid.valid_count() > 0);
        let scaled = scale(&grid, &PrintDimensions::default()).unwrap();

        // Footprint in CRS units, mirrored to follow negative axes
        let sx = if fx { -1.0 } else { 1.0 };
        let sy = if fy { -1.0 } else { 1.0 };
        let ring = vec![
            (sx * x0, sy * y0),
            (sx * (x0 + size), sy * y0),
            (sx * (x0 + size), sy * (y0 + size)),
            (sx * x0, sy * (y0 + size)),
            (sx * x0, sy * y0),
        ];
        let feature = VectorFeature::new(FeatureGeometry::Area(geo::MultiPolygon::new(vec![
            geo::Polygon::new(geo::LineString::from(ring), vec![]),
        ])))
        .with_attribute("landuse", "forest");
        let groups = vec![TagGroup::new("forest", vec![PredicateSet::new().with("landuse", "forest")])];

        let layers = layer(&scaled, &[feature], &groups, &OverlayConfig::default()).unwrap();

        prop_assert_eq!(layers.len(), 1);
        let report = validate_component(&layers[0]);
        prop_assert!(report.is_printable(), "{}", report.summary());
    }
}
