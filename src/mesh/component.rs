use crate::geometry::Extent;

/// A triangle with its facet normal, for formats that store unindexed facets
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Three vertices: [[x, y, z], [x, y, z], [x, y, z]]
    pub vertices: [[f32; 3]; 3],
    /// Normal vector [nx, ny, nz]
    pub normal: [f32; 3],
}

impl Triangle {
    /// Create a new triangle and calculate its normal
    pub fn new(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> Self {
        let normal = calculate_normal(v0, v1, v2);
        Self {
            vertices: [v0, v1, v2],
            normal,
        }
    }
}

/// Calculate the normal vector for a triangle using the cross product
pub(crate) fn calculate_normal(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> [f32; 3] {
    let u = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let v = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

    let nx = u[1] * v[2] - u[2] * v[1];
    let ny = u[2] * v[0] - u[0] * v[2];
    let nz = u[0] * v[1] - u[1] * v[0];

    let len = (nx * nx + ny * ny + nz * nz).sqrt();
    if len > 1e-10 {
        [nx / len, ny / len, nz / len]
    } else {
        [0.0, 0.0, 1.0] // Default to up for degenerate triangles
    }
}

/// An indexed triangle mesh in millimetres, exported as one object/layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshComponent {
    name: String,
    layer: Option<u32>,
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

impl MeshComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn from_parts(
        name: impl Into<String>,
        vertices: Vec<[f32; 3]>,
        triangles: Vec<[u32; 3]>,
    ) -> Self {
        debug_assert!(
            triangles
                .iter()
                .flatten()
                .all(|&i| (i as usize) < vertices.len())
        );
        Self {
            name: name.into(),
            layer: None,
            vertices,
            triangles,
        }
    }

    /// Tag the component with its print layer (0 for terrain, overlays from 1),
    /// listed in the console print guide
    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = Some(layer);
        self
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, position: [f32; 3]) -> u32 {
        self.vertices.push(position);
        (self.vertices.len() - 1) as u32
    }

    /// Add a triangle by vertex indices; indices must already exist
    pub fn add_triangle(&mut self, indices: [u32; 3]) {
        debug_assert!(indices.iter().all(|&i| (i as usize) < self.vertices.len()));
        self.triangles.push(indices);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> Option<u32> {
        self.layer
    }

    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Highest vertex z, or 0 for an empty component
    pub fn max_z(&self) -> f32 {
        self.vertices.iter().map(|v| v[2]).fold(0.0, f32::max)
    }

    /// XY bounds of the vertices, or `None` for a component without vertices
    pub fn extent_xy(&self) -> Option<Extent> {
        let points: Vec<(f64, f64)> = self
            .vertices
            .iter()
            .map(|v| (f64::from(v[0]), f64::from(v[1])))
            .collect();
        Extent::from_points(&points)
    }

    /// Resolve indices into standalone facets with normals
    pub fn facets(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.triangles.iter().map(|&[a, b, c]| {
            Triangle::new(
                self.vertices[a as usize],
                self.vertices[b as usize],
                self.vertices[c as usize],
            )
        })
    }
}
