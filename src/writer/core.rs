//! Resource and build element writers
//!
//! Only what a flattened package needs is emitted: inline meshes,
//! components, and build items with placement and printable flag.

use super::{close, open, write_empty};
use crate::error::Result;
use crate::model::*;
use crate::transform::format_number;
use quick_xml::Writer;
use quick_xml::events::BytesStart;
use std::io::Write as IoWrite;

fn number_list(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_number(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write an object with its mesh and components
pub(super) fn write_object<W: IoWrite>(writer: &mut Writer<W>, object: &Object) -> Result<()> {
    let mut elem = BytesStart::new("object");
    elem.push_attribute(("id", object.id.to_string().as_str()));
    elem.push_attribute(("type", object.object_type.as_str()));
    if let Some(name) = object.name.as_deref() {
        elem.push_attribute(("name", name));
    }

    open(writer, elem)?;
    if let Some(mesh) = &object.mesh {
        write_mesh(writer, mesh)?;
    }
    if !object.components.is_empty() {
        write_components(writer, &object.components)?;
    }
    close(writer, "object")
}

/// Write a mesh; coordinates use the shared six-decimal formatting
pub(super) fn write_mesh<W: IoWrite>(writer: &mut Writer<W>, mesh: &Mesh) -> Result<()> {
    open(writer, BytesStart::new("mesh"))?;

    open(writer, BytesStart::new("vertices"))?;
    for vertex in &mesh.vertices {
        let mut elem = BytesStart::new("vertex");
        elem.push_attribute(("x", format_number(vertex.x).as_str()));
        elem.push_attribute(("y", format_number(vertex.y).as_str()));
        elem.push_attribute(("z", format_number(vertex.z).as_str()));
        write_empty(writer, elem)?;
    }
    close(writer, "vertices")?;

    open(writer, BytesStart::new("triangles"))?;
    for triangle in &mesh.triangles {
        let mut elem = BytesStart::new("triangle");
        elem.push_attribute(("v1", triangle.v1.to_string().as_str()));
        elem.push_attribute(("v2", triangle.v2.to_string().as_str()));
        elem.push_attribute(("v3", triangle.v3.to_string().as_str()));
        write_empty(writer, elem)?;
    }
    close(writer, "triangles")?;

    close(writer, "mesh")
}

/// Write a `<components>` block
///
/// Sub-file paths are written absolute, as the production extension expects.
pub(super) fn write_components<W: IoWrite>(
    writer: &mut Writer<W>,
    components: &[Component],
) -> Result<()> {
    open(writer, BytesStart::new("components"))?;
    for component in components {
        let mut elem = BytesStart::new("component");
        if let Some(path) = component.path.as_deref() {
            let absolute = format!("/{}", path.trim_start_matches('/'));
            elem.push_attribute(("p:path", absolute.as_str()));
        }
        elem.push_attribute(("objectid", component.objectid.to_string().as_str()));
        if let Some(transform) = &component.transform {
            elem.push_attribute(("transform", number_list(transform).as_str()));
        }
        write_empty(writer, elem)?;
    }
    close(writer, "components")
}

/// Write the build list
pub(super) fn write_build<W: IoWrite>(writer: &mut Writer<W>, build: &Build) -> Result<()> {
    open(writer, BytesStart::new("build"))?;
    for item in &build.items {
        let mut elem = BytesStart::new("item");
        elem.push_attribute(("objectid", item.objectid.to_string().as_str()));
        if let Some(transform) = &item.transform {
            elem.push_attribute(("transform", number_list(transform).as_str()));
        }
        // printable is the default
        if !item.printable {
            elem.push_attribute(("printable", "0"));
        }
        write_empty(writer, elem)?;
    }
    close(writer, "build")
}
