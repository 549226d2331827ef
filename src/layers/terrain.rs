use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult, Stage};
use crate::geometry::ScaledGrid;
use crate::mesh::{MeshComponent, SolidField, SolidSample, build_solid};

/// Name of the terrain component in the exported model
pub const TERRAIN_NAME: &str = "terrain";

/// Layer id of the terrain; overlay groups start at 1
pub const TERRAIN_LAYER: u32 = 0;

/// Triangulate a scaled grid into a closed terrain solid standing on z = 0.
///
/// Valid cells without any complete 2x2 neighbourhood cannot form a quad and
/// are left out, so the result may be empty even when valid cells exist.
pub fn triangulate(scaled: &ScaledGrid) -> PipelineResult<MeshComponent> {
    let valid = scaled.valid_count();
    if valid == 0 {
        return Err(PipelineError::EmptyGrid {
            stage: Stage::Triangulate,
        });
    }

    let field = SolidField {
        width: scaled.width(),
        height: scaled.height(),
        mirrored: scaled.is_mirrored(),
        samples: scaled
            .positions()
            .iter()
            .map(|p| {
                p.map(|[x, y, z]| SolidSample {
                    x,
                    y,
                    top: z,
                    bottom: 0.0,
                })
            })
            .collect(),
    };

    let mesh = build_solid(&field, TERRAIN_NAME).with_layer(TERRAIN_LAYER);
    if mesh.is_empty() {
        warn!(valid, "no 2x2 block of valid cells; terrain has no surface");
    } else {
        debug!(
            valid,
            vertices = mesh.vertices().len(),
            triangles = mesh.triangles().len(),
            "triangulated terrain"
        );
    }
    Ok(mesh)
}
