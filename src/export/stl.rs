use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::mesh::ExportedSolid;

/// Write every component of the model into one binary STL file
///
/// Binary STL format:
/// - 80 byte header
/// - 4 byte u32 triangle count (little endian)
/// - For each triangle:
///   - 3 x f32 normal (12 bytes)
///   - 3 x 3 x f32 vertices (36 bytes)
///   - 2 byte attribute (usually 0)
///
/// STL has no notion of objects, so layer separation is lost; use 3MF when
/// printing layers in different colours.
pub fn write_stl(path: &Path, solid: &ExportedSolid) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create STL file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let mut header = [b' '; 80];
    let title = b"terramesh - terrain model STL (mm, Z up)";
    header[..title.len()].copy_from_slice(title);
    writer.write_all(&header)?;

    let count = solid.triangle_count() as u32;
    writer.write_all(&count.to_le_bytes())?;

    for component in solid.components() {
        for tri in component.facets() {
            for &n in &tri.normal {
                writer.write_all(&n.to_le_bytes())?;
            }

            for vertex in &tri.vertices {
                for &coord in vertex {
                    writer.write_all(&coord.to_le_bytes())?;
                }
            }

            // Attribute byte count
            writer.write_all(&[0u8, 0u8])?;
        }
    }

    writer.flush()?;

    Ok(())
}

/// Get the file size of an STL with the given number of triangles
pub fn estimate_stl_size(triangle_count: usize) -> usize {
    // 80 (header) + 4 (count) + triangles * (12 normal + 36 vertices + 2 attribute)
    80 + 4 + triangle_count * 50
}
