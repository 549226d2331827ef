use std::fmt;

use tracing::debug;

use super::MeshComponent;

/// Length unit of exported coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millimetre,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Millimetre => write!(f, "millimeter"),
        }
    }
}

/// Axis pointing away from the print bed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpAxis {
    Z,
}

/// The finished model: terrain first, then overlay layers in group order.
///
/// Immutable once assembled; exporters only read it.
#[derive(Debug, Clone)]
pub struct ExportedSolid {
    components: Vec<MeshComponent>,
    unit: Unit,
    up_axis: UpAxis,
}

impl ExportedSolid {
    pub fn components(&self) -> &[MeshComponent] {
        &self.components
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn up_axis(&self) -> UpAxis {
        self.up_axis
    }

    pub fn triangle_count(&self) -> usize {
        self.components.iter().map(|c| c.triangles().len()).sum()
    }

    /// Tallest point of the model in mm
    pub fn max_z(&self) -> f32 {
        self.components
            .iter()
            .map(MeshComponent::max_z)
            .fold(0.0, f32::max)
    }
}

/// Collect components into the exported model without merging geometry.
///
/// Empty components are skipped.
pub fn assemble(terrain: MeshComponent, layers: Vec<MeshComponent>) -> ExportedSolid {
    let components: Vec<MeshComponent> = std::iter::once(terrain)
        .chain(layers)
        .filter(|component| {
            if component.is_empty() {
                debug!(name = component.name(), "omitting empty component");
            }
            !component.is_empty()
        })
        .collect();

    ExportedSolid {
        components,
        unit: Unit::Millimetre,
        up_axis: UpAxis::Z,
    }
}
