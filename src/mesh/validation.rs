//! Mesh validation for 3D printing
//!
//! Checks indexed mesh components for:
//! - Degenerate triangles (zero area or repeated indices)
//! - NaN/Inf coordinates and out-of-range indices
//! - Edge manifoldness and closure (every edge shared by exactly two triangles)
//! - Consistent winding (each directed edge used once) and enclosed volume

use std::collections::HashMap;

use super::MeshComponent;

/// Result of mesh validation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationResult {
    /// Total number of triangles validated
    pub total: usize,
    /// Number of degenerate triangles (zero area or repeated indices)
    pub degenerate: usize,
    /// Number of triangles with NaN/Inf coordinates
    pub invalid_coords: usize,
    /// Number of triangles referencing missing vertices
    pub out_of_range: usize,
    /// Edges used by exactly one triangle
    pub boundary_edges: usize,
    /// Edges used by more than two triangles
    pub non_manifold_edges: usize,
    /// Directed edges used more than once (flipped neighbour winding)
    pub inconsistent_edges: usize,
    /// Signed enclosed volume in mm³; positive for outward-facing normals
    pub volume: f64,
}

impl ValidationResult {
    /// Every edge is shared by exactly two triangles
    pub fn is_closed(&self) -> bool {
        self.boundary_edges == 0 && self.non_manifold_edges == 0
    }

    /// Closed, consistently wound, and free of broken triangles
    pub fn is_printable(&self) -> bool {
        self.is_closed()
            && self.inconsistent_edges == 0
            && self.degenerate == 0
            && self.invalid_coords == 0
            && self.out_of_range == 0
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        if self.is_printable() {
            format!(
                "Mesh valid: {} triangles, closed, volume {:.1}mm³",
                self.total, self.volume
            )
        } else {
            format!(
                "Mesh issues: {} total, {} degenerate, {} invalid coords, {} bad indices, {} open edges, {} non-manifold edges, {} flipped edges",
                self.total,
                self.degenerate,
                self.invalid_coords,
                self.out_of_range,
                self.boundary_edges,
                self.non_manifold_edges,
                self.inconsistent_edges
            )
        }
    }
}

/// Minimum area threshold for non-degenerate triangles (in square mm)
const MIN_TRIANGLE_AREA: f64 = 1e-10;

/// Validate a mesh component and return a detailed report
pub fn validate_component(mesh: &MeshComponent) -> ValidationResult {
    let vertices = mesh.vertices();
    let triangles = mesh.triangles();
    let mut result = ValidationResult {
        total: triangles.len(),
        ..Default::default()
    };

    let mut undirected: HashMap<(u32, u32), usize> = HashMap::new();
    let mut directed: HashMap<(u32, u32), usize> = HashMap::new();

    for tri in triangles {
        if tri.iter().any(|&i| i as usize >= vertices.len()) {
            result.out_of_range += 1;
            continue;
        }
        let corners = tri.map(|i| vertices[i as usize]);
        if corners.iter().flatten().any(|c| !c.is_finite()) {
            result.invalid_coords += 1;
            continue;
        }
        if is_degenerate(tri, &corners) {
            result.degenerate += 1;
        }
        result.volume += signed_volume(&corners);

        for k in 0..3 {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            *directed.entry((a, b)).or_default() += 1;
            *undirected.entry((a.min(b), a.max(b))).or_default() += 1;
        }
    }

    for &count in undirected.values() {
        match count {
            1 => result.boundary_edges += 1,
            2 => {}
            _ => result.non_manifold_edges += 1,
        }
    }
    result.inconsistent_edges = directed.values().filter(|&&c| c > 1).count();

    result
}

/// Drop degenerate triangles in place, returning how many were removed
pub fn remove_degenerate(vertices: &[[f32; 3]], triangles: &mut Vec<[u32; 3]>) -> usize {
    let before = triangles.len();
    triangles.retain(|tri| {
        let corners = tri.map(|i| vertices[i as usize]);
        !is_degenerate(tri, &corners)
    });
    before - triangles.len()
}

/// Check if a triangle repeats an index or has near-zero area
fn is_degenerate(tri: &[u32; 3], corners: &[[f32; 3]; 3]) -> bool {
    tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] || triangle_area(corners) < MIN_TRIANGLE_AREA
}

/// Calculate the area of a triangle from its vertices
fn triangle_area(vertices: &[[f32; 3]; 3]) -> f64 {
    let [v0, v1, v2] = vertices.map(|v| v.map(f64::from));

    let edge_a = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let edge_b = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

    let cx = edge_a[1] * edge_b[2] - edge_a[2] * edge_b[1];
    let cy = edge_a[2] * edge_b[0] - edge_a[0] * edge_b[2];
    let cz = edge_a[0] * edge_b[1] - edge_a[1] * edge_b[0];

    0.5 * (cx * cx + cy * cy + cz * cz).sqrt()
}

/// Signed volume of the tetrahedron spanned by the origin and a triangle
fn signed_volume(vertices: &[[f32; 3]; 3]) -> f64 {
    let [a, b, c] = vertices.map(|v| v.map(f64::from));
    let cross = [
        b[1] * c[2] - b[2] * c[1],
        b[2] * c[0] - b[0] * c[2],
        b[0] * c[1] - b[1] * c[0],
    ];
    (a[0] * cross[0] + a[1] * cross[1] + a[2] * cross[2]) / 6.0
}
