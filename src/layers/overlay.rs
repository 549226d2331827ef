use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::OverlayConfig;
use crate::domain::{TagGroup, VectorFeature, assign_group};
use crate::error::{PipelineError, PipelineResult};
use crate::geometry::{ScaledGrid, footprint_cells};
use crate::mesh::{MeshComponent, SolidField, SolidSample, build_solid};

/// Classify features into groups and build one raised solid per group.
///
/// Each feature goes to the first group it matches; features matching no
/// group are dropped. Features are rasterized onto the scaled grid's cells and
/// every cell belongs to at most one overlay: earlier groups claim cells
/// before later ones, and within a group the first feature in input order
/// sets the cell's height. Overlay solids rest on the terrain surface.
///
/// Returns one component per group that received at least one feature, in
/// group order, tagged with layer `group index + 1`.
pub fn layer(
    scaled: &ScaledGrid,
    features: &[VectorFeature],
    groups: &[TagGroup],
    config: &OverlayConfig,
) -> PipelineResult<Vec<MeshComponent>> {
    for (parameter, value) in [
        ("nominal_height_mm", config.nominal_height_mm),
        ("min_height_mm", config.min_height_mm),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(PipelineError::DegenerateScale { parameter, value });
        }
    }

    let (width, height) = (scaled.width(), scaled.height());
    let transform = scaled.transform();
    let half_width = config.line_half_width.unwrap_or_else(|| {
        transform.cell_size_x.abs().max(transform.cell_size_y.abs())
    });

    // (group, cells, extrusion) per assigned feature, in input order
    let assigned: Vec<(usize, Vec<usize>, f64)> = features
        .par_iter()
        .filter_map(|feature| {
            let group = assign_group(groups, &feature.attributes)?;
            let cells = footprint_cells(&feature.geometry, transform, width, height, half_width);
            Some((group, cells, extrusion_mm(feature, scaled, config)))
        })
        .collect();

    let dropped = features.len() - assigned.len();
    if dropped > 0 {
        debug!(dropped, "features matched no group");
    }

    let mut claimed = vec![false; width * height];
    let mut components = Vec::new();

    for (group_index, group) in groups.iter().enumerate() {
        let members: Vec<&(usize, Vec<usize>, f64)> = assigned
            .iter()
            .filter(|(g, _, _)| *g == group_index)
            .collect();
        if members.is_empty() {
            continue;
        }

        let mut extrusion: Vec<Option<f64>> = vec![None; width * height];
        for (_, cells, rise) in &members {
            for &cell in cells {
                if !claimed[cell] && scaled.positions()[cell].is_some() {
                    claimed[cell] = true;
                    extrusion[cell] = Some(*rise);
                }
            }
        }

        let field = SolidField {
            width,
            height,
            mirrored: scaled.is_mirrored(),
            samples: scaled
                .positions()
                .iter()
                .zip(&extrusion)
                .map(|(position, rise)| {
                    let [x, y, z] = (*position)?;
                    let rise = (*rise)?;
                    Some(SolidSample {
                        x,
                        y,
                        top: z + rise,
                        bottom: z,
                    })
                })
                .collect(),
        };

        let cells = extrusion.iter().filter(|e| e.is_some()).count();
        let component = build_solid(&field, &group.name).with_layer(group_index as u32 + 1);
        info!(
            group = %group.name,
            features = members.len(),
            cells,
            triangles = component.triangles().len(),
            "built overlay layer"
        );
        components.push(component);
    }

    Ok(components)
}

/// Height of a feature above the terrain in mm
fn extrusion_mm(feature: &VectorFeature, scaled: &ScaledGrid, config: &OverlayConfig) -> f64 {
    let Some(raw) = feature.attributes.get(&config.height_key) else {
        return config.nominal_height_mm;
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => {
            (value * scaled.vertical_scale()).max(config.min_height_mm)
        }
        _ => {
            warn!(
                key = %config.height_key,
                value = %raw,
                "unparsable feature height, using nominal extrusion"
            );
            config.nominal_height_mm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ElevationGrid, FeatureGeometry, GeoTransform, PredicateSet, TagValue};
    use crate::geometry::{PrintDimensions, scale};
    use crate::mesh::validate_component;
    use approx::assert_relative_eq;
    use geo::{LineString, MultiLineString, MultiPolygon, Polygon};

    /// Flat 4x4 grid of unit cells: 25mm per cell, terrain top at z = 1
    fn flat_grid() -> ScaledGrid {
        let grid = ElevationGrid::new(4, 4, vec![50.0; 16], -9999.0, GeoTransform::new(0.0, 0.0, 1.0, 1.0))
            .unwrap();
        scale(&grid, &PrintDimensions::default()).unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> FeatureGeometry {
        let ring = LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]);
        FeatureGeometry::Area(MultiPolygon::new(vec![Polygon::new(ring, vec![])]))
    }

    fn group(name: &str, key: &str, value: &str) -> TagGroup {
        TagGroup::new(name, vec![PredicateSet::new().with(key, value)])
    }

    fn building() -> VectorFeature {
        VectorFeature::new(rect(0.0, 0.0, 2.0, 2.0)).with_attribute("building", "yes")
    }

    #[test]
    fn test_feature_assigned_to_matching_group() {
        let groups = vec![group("water", "natural", "water"), group("buildings", "building", "yes")];

        let layers = layer(&flat_grid(), &[building()], &groups, &OverlayConfig::default()).unwrap();

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name(), "buildings");
        assert_eq!(layers[0].layer(), Some(2));
        assert_eq!(layers[0].triangles().len(), 12);
        let report = validate_component(&layers[0]);
        assert!(report.is_printable(), "{}", report.summary());
    }

    #[test]
    fn test_first_group_wins() {
        let groups = vec![
            group("a", "building", "yes"),
            TagGroup::new("b", vec![PredicateSet::new().with("building", TagValue::Any(true))]),
        ];

        let layers = layer(&flat_grid(), &[building()], &groups, &OverlayConfig::default()).unwrap();

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name(), "a");
    }

    #[test]
    fn test_unmatched_feature_dropped() {
        let groups = vec![group("water", "natural", "water")];
        let layers = layer(&flat_grid(), &[building()], &groups, &OverlayConfig::default()).unwrap();
        assert!(layers.is_empty());
    }

    #[test]
    fn test_cells_claimed_by_earlier_group() {
        let groups = vec![group("water", "natural", "water"), group("buildings", "building", "yes")];
        let water = VectorFeature::new(rect(0.0, 0.0, 4.0, 4.0)).with_attribute("natural", "water");

        let layers =
            layer(&flat_grid(), &[building(), water], &groups, &OverlayConfig::default()).unwrap();

        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].name(), "water");
        assert!(!layers[0].is_empty());
        assert!(layers[1].is_empty());
    }

    #[test]
    fn test_height_attribute_scaled() {
        let groups = vec![group("buildings", "building", "yes")];
        let tall = building().with_attribute("height", "0.1");

        let layers = layer(&flat_grid(), &[tall], &groups, &OverlayConfig::default()).unwrap();

        // 0.1 units * 25 mm/unit above the terrain top at 1 mm
        assert_relative_eq!(layers[0].max_z(), 3.5, epsilon = 1e-5);
    }

    #[test]
    fn test_height_clamped_and_fallback() {
        let groups = vec![group("buildings", "building", "yes")];
        let grid = flat_grid();

        let thin = building().with_attribute("height", "0.0001");
        let layers = layer(&grid, &[thin], &groups, &OverlayConfig::default()).unwrap();
        assert_relative_eq!(layers[0].max_z(), 1.2, epsilon = 1e-5);

        let junk = building().with_attribute("height", "tall");
        let layers = layer(&grid, &[junk], &groups, &OverlayConfig::default()).unwrap();
        assert_relative_eq!(layers[0].max_z(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_line_corridor() {
        let groups = vec![group("roads", "highway", "primary")];
        let line = LineString::from(vec![(0.0, 1.0), (4.0, 1.0)]);
        let road = VectorFeature::new(FeatureGeometry::Line(MultiLineString::new(vec![line])))
            .with_attribute("highway", "primary");

        let config = OverlayConfig {
            line_half_width: Some(0.6),
            ..Default::default()
        };
        let layers = layer(&flat_grid(), &[road], &groups, &config).unwrap();

        // Rows 0 and 1 are within 0.5 of y = 1: a 4x2 strip, three quads
        let report = validate_component(&layers[0]);
        assert!(report.is_printable(), "{}", report.summary());
        assert_eq!(layers[0].triangles().len(), 3 * 4 + 8 * 2);
    }

    #[test]
    fn test_degenerate_nominal_height() {
        let config = OverlayConfig {
            nominal_height_mm: 0.0,
            ..Default::default()
        };
        assert!(layer(&flat_grid(), &[], &[], &config).is_err());
    }
}
