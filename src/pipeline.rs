//! Single entry point running every stage in order:
//! compose, clip, scale, triangulate, overlay, assemble.

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::domain::{Boundary, ElevationGrid, VectorFeature};
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::geometry::scale;
use crate::layers::{layer, triangulate};
use crate::mesh::{ExportedSolid, ValidationResult, assemble, validate_component};
use crate::raster::{ComposeOptions, annotate_feature_heights, clip, compose};

/// Fully decoded inputs, already in one CRS
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    /// Terrain (DTM) tiles in priority order
    pub tiles: Vec<ElevationGrid>,
    /// Optional surface (DSM) tiles used to derive feature heights
    pub surface_tiles: Vec<ElevationGrid>,
    /// Clip polygon; the whole composited grid is used when absent
    pub boundary: Option<Boundary>,
    /// Overlay features, classified by the configured groups
    pub features: Vec<VectorFeature>,
}

/// Figures describing a finished run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub grid_width: usize,
    pub grid_height: usize,
    pub valid_cells: usize,
    pub elevation_range: (f64, f64),
    /// mm per CRS unit
    pub horizontal_scale: f64,
    /// mm per elevation unit
    pub vertical_scale: f64,
    /// Footprint of the terrain solid on the bed, (x, y) in mm
    pub footprint_mm: (f64, f64),
    /// Features that received a height from the surface model
    pub surface_heights: usize,
    /// Validation report per exported component, in export order
    pub reports: Vec<(String, ValidationResult)>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub solid: ExportedSolid,
    pub stats: PipelineStats,
}

/// Run the whole pipeline. Fails on the first stage error; no partial model is
/// returned.
pub fn run(input: PipelineInput, config: &PipelineConfig) -> PipelineResult<PipelineOutput> {
    let PipelineInput {
        tiles,
        surface_tiles,
        boundary,
        mut features,
    } = input;

    let options = ComposeOptions {
        target_extent: boundary.as_ref().map(|b| *b.extent()),
        allow_partial_coverage: config.allow_partial_coverage,
    };
    let composed = compose(&tiles, &options)?;

    let terrain_grid = match &boundary {
        Some(boundary) => clip(&composed, boundary, config.fill_rule)?,
        None => composed,
    };

    let surface_heights = if surface_tiles.is_empty() || features.is_empty() {
        0
    } else {
        let surface = compose(
            &surface_tiles,
            &ComposeOptions {
                target_extent: Some(terrain_grid.extent()),
                allow_partial_coverage: true,
            },
        )
        .map_err(|e| match e {
            PipelineError::GridMismatch { input, reason, .. } => PipelineError::GridMismatch {
                stage: Stage::Surface,
                input: format!("surface {input}"),
                reason,
            },
            other => other,
        })?;
        let transform = terrain_grid.transform();
        let half_width = config.overlay.line_half_width.unwrap_or_else(|| {
            transform.cell_size_x.abs().max(transform.cell_size_y.abs())
        });
        annotate_feature_heights(
            &mut features,
            &surface,
            &terrain_grid,
            &config.overlay.height_key,
            half_width,
        )?
    };

    let scaled = scale(&terrain_grid, &config.dimensions)?;

    let terrain = triangulate(&scaled)?;
    if terrain.is_empty() {
        return Err(PipelineError::EmptyGrid {
            stage: Stage::Triangulate,
        });
    }

    let footprint_mm = terrain
        .extent_xy()
        .map_or((0.0, 0.0), |e| (e.width(), e.height()));

    let layers = layer(&scaled, &features, &config.groups, &config.overlay)?;
    let solid = assemble(terrain, layers);

    let reports: Vec<(String, ValidationResult)> = solid
        .components()
        .iter()
        .map(|component| {
            let report = validate_component(component);
            if report.is_printable() {
                info!(component = component.name(), "{}", report.summary());
            } else {
                warn!(component = component.name(), "{}", report.summary());
            }
            (component.name().to_string(), report)
        })
        .collect();

    let stats = PipelineStats {
        grid_width: scaled.width(),
        grid_height: scaled.height(),
        valid_cells: scaled.valid_count(),
        elevation_range: scaled.elevation_range(),
        horizontal_scale: scaled.horizontal_scale(),
        vertical_scale: scaled.vertical_scale(),
        footprint_mm,
        surface_heights,
        reports,
    };

    info!(
        components = solid.components().len(),
        triangles = solid.triangle_count(),
        "assembled model"
    );
    Ok(PipelineOutput { solid, stats })
}
