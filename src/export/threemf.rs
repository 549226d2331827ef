//! 3MF (3D Manufacturing Format) export.
//!
//! A 3MF file is a ZIP archive holding:
//! - `3D/3dmodel.model` - the model XML
//! - `[Content_Types].xml` - MIME type mappings
//! - `_rels/.rels` - relationships
//!
//! Every mesh component becomes its own named `<object>`, so slicers can give
//! each layer its own filament. A final components object groups them and is
//! the single build item, keeping all layers registered to each other.

use anyhow::{Context, Result, bail};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::mesh::{ExportedSolid, MeshComponent};

const NAMESPACE_3MF: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

const MODEL_PATH: &str = "3D/3dmodel.model";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// Write the model to a 3MF file
pub fn write_3mf(path: &Path, solid: &ExportedSolid) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create 3MF file: {}", path.display()))?;
    write_3mf_to(BufWriter::new(file), solid)
        .with_context(|| format!("Failed to write 3MF file: {}", path.display()))
}

/// Write the model as a 3MF archive into any seekable writer
pub fn write_3mf_to<W: Write + Seek>(writer: W, solid: &ExportedSolid) -> Result<()> {
    if solid.components().is_empty() {
        bail!("model has no mesh components to export");
    }

    let mut zip = ZipWriter::new(writer);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(RELS_XML.as_bytes())?;

    let model_xml = model_xml(solid)?;
    zip.start_file(MODEL_PATH, options)?;
    zip.write_all(&model_xml)?;

    let mut inner = zip.finish().context("Failed to finalize ZIP archive")?;
    inner.flush()?;
    Ok(())
}

fn model_xml(solid: &ExportedSolid) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let unit = solid.unit().to_string();
    let mut model = BytesStart::new("model");
    model.push_attribute(("xmlns", NAMESPACE_3MF));
    model.push_attribute(("unit", unit.as_str()));
    model.push_attribute(("xml:lang", "en-US"));
    writer.write_event(Event::Start(model))?;

    let mut metadata = BytesStart::new("metadata");
    metadata.push_attribute(("name", "Application"));
    writer.write_event(Event::Start(metadata))?;
    writer.write_event(Event::Text(BytesText::new("terramesh")))?;
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;

    writer.write_event(Event::Start(BytesStart::new("resources")))?;

    for (index, component) in solid.components().iter().enumerate() {
        write_mesh_object(&mut writer, index + 1, component)?;
    }

    let assembly_id = (solid.components().len() + 1).to_string();
    let mut assembly = BytesStart::new("object");
    assembly.push_attribute(("id", assembly_id.as_str()));
    assembly.push_attribute(("type", "model"));
    assembly.push_attribute(("name", "terramesh"));
    writer.write_event(Event::Start(assembly))?;
    writer.write_event(Event::Start(BytesStart::new("components")))?;
    for index in 1..=solid.components().len() {
        let id = index.to_string();
        let mut component = BytesStart::new("component");
        component.push_attribute(("objectid", id.as_str()));
        writer.write_event(Event::Empty(component))?;
    }
    writer.write_event(Event::End(BytesEnd::new("components")))?;
    writer.write_event(Event::End(BytesEnd::new("object")))?;

    writer.write_event(Event::End(BytesEnd::new("resources")))?;

    writer.write_event(Event::Start(BytesStart::new("build")))?;
    let mut item = BytesStart::new("item");
    item.push_attribute(("objectid", assembly_id.as_str()));
    writer.write_event(Event::Empty(item))?;
    writer.write_event(Event::End(BytesEnd::new("build")))?;

    writer.write_event(Event::End(BytesEnd::new("model")))?;

    Ok(buffer)
}

fn write_mesh_object<W: Write>(
    writer: &mut Writer<W>,
    id: usize,
    component: &MeshComponent,
) -> Result<()> {
    let id = id.to_string();
    let mut object = BytesStart::new("object");
    object.push_attribute(("id", id.as_str()));
    object.push_attribute(("type", "model"));
    object.push_attribute(("name", component.name()));
    writer.write_event(Event::Start(object))?;
    writer.write_event(Event::Start(BytesStart::new("mesh")))?;

    writer.write_event(Event::Start(BytesStart::new("vertices")))?;
    for v in component.vertices() {
        let mut vertex = BytesStart::new("vertex");
        vertex.push_attribute(("x", format!("{:.6}", v[0]).as_str()));
        vertex.push_attribute(("y", format!("{:.6}", v[1]).as_str()));
        vertex.push_attribute(("z", format!("{:.6}", v[2]).as_str()));
        writer.write_event(Event::Empty(vertex))?;
    }
    writer.write_event(Event::End(BytesEnd::new("vertices")))?;

    writer.write_event(Event::Start(BytesStart::new("triangles")))?;
    for &[v1, v2, v3] in component.triangles() {
        let mut triangle = BytesStart::new("triangle");
        triangle.push_attribute(("v1", v1.to_string().as_str()));
        triangle.push_attribute(("v2", v2.to_string().as_str()));
        triangle.push_attribute(("v3", v3.to_string().as_str()));
        writer.write_event(Event::Empty(triangle))?;
    }
    writer.write_event(Event::End(BytesEnd::new("triangles")))?;

    writer.write_event(Event::End(BytesEnd::new("mesh")))?;
    writer.write_event(Event::End(BytesEnd::new("object")))?;
    Ok(())
}
