//! XML writing for 3MF model files
//!
//! This module serializes a [`Model`] back into a 3MF-compliant geometry part.
//! It is used to produce clean packages from a resolved resource graph;
//! rewrites of existing packages go through [`crate::xml`] instead so that
//! untouched content keeps its original bytes.

mod core;

use crate::error::{Error, Result};
use crate::model::*;
use crate::opc::{CORE_NAMESPACE, PRODUCTION_NAMESPACE};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write as IoWrite;

/// Write a model as a geometry part
///
/// Output is indented by two spaces. The production namespace is declared
/// only when a component points into another part.
pub fn write_model_xml<W: IoWrite>(model: &Model, writer: W) -> Result<()> {
    let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);
    xml_writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::xml_write(format!("Failed to write XML declaration: {}", e)))?;

    let mut root = BytesStart::new("model");
    root.push_attribute(("unit", model.unit.as_str()));
    root.push_attribute(("xml:lang", "en-US"));
    root.push_attribute(("xmlns", CORE_NAMESPACE));
    let uses_paths = model
        .resources
        .objects
        .iter()
        .flat_map(|o| o.components.iter())
        .any(|c| c.path.is_some());
    if uses_paths {
        root.push_attribute(("xmlns:p", PRODUCTION_NAMESPACE));
    }
    open(&mut xml_writer, root)?;

    for entry in &model.metadata {
        let mut elem = BytesStart::new("metadata");
        elem.push_attribute(("name", entry.name.as_str()));
        open(&mut xml_writer, elem)?;
        xml_writer
            .write_event(Event::Text(BytesText::new(&entry.value)))
            .map_err(|e| Error::xml_write(format!("Failed to write metadata value: {}", e)))?;
        close(&mut xml_writer, "metadata")?;
    }

    open(&mut xml_writer, BytesStart::new("resources"))?;
    for object in &model.resources.objects {
        core::write_object(&mut xml_writer, object)?;
    }
    close(&mut xml_writer, "resources")?;

    core::write_build(&mut xml_writer, &model.build)?;
    close(&mut xml_writer, "model")
}

/// Serialize a model into an in-memory geometry part
pub fn model_to_bytes(model: &Model) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_model_xml(model, &mut buffer)?;
    Ok(buffer)
}

fn open<W: IoWrite>(writer: &mut Writer<W>, elem: BytesStart<'_>) -> Result<()> {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    writer
        .write_event(Event::Start(elem))
        .map(|_| ())
        .map_err(|e| Error::xml_write(format!("Failed to write <{}>: {}", name, e)))
}

fn close<W: IoWrite>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map(|_| ())
        .map_err(|e| Error::xml_write(format!("Failed to close <{}>: {}", name, e)))
}

fn write_empty<W: IoWrite>(writer: &mut Writer<W>, elem: BytesStart<'_>) -> Result<()> {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    writer
        .write_event(Event::Empty(elem))
        .map(|_| ())
        .map_err(|e| Error::xml_write(format!("Failed to write <{}>: {}", name, e)))
}
