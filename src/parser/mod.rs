//! Streaming XML parsing for 3MF model parts
//!
//! Only the resource graph is materialized: objects, meshes, components and
//! build items. Vendor files carry many extra attributes and elements; those
//! are skipped rather than rejected.

mod core;

use crate::error::{Error, Result};
use crate::model::*;
use quick_xml::Reader;
use quick_xml::events::Event;

use self::core::{parse_build_item, parse_component, parse_object, parse_triangle, parse_vertex};

/// Default buffer capacity for XML parsing (4KB)
const XML_BUFFER_CAPACITY: usize = 4096;

/// Strip the namespace prefix from an element or attribute name
///
/// - `"m:colorgroup"` returns `"colorgroup"`
/// - `"p:path"` returns `"path"`
/// - `"object"` returns `"object"`
pub(crate) fn get_local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Parse a model part into its resource graph
///
/// `part` names the part in error messages. Any syntax or numeric error is
/// reported as [`Error::MalformedPart`].
pub fn parse_model(part: &str, xml: &[u8]) -> Result<Model> {
    parse_model_inner(xml).map_err(|e| match e {
        Error::MalformedPart { .. } => e,
        other => Error::malformed(part, other.to_string()),
    })
}

fn parse_model_inner(xml: &[u8]) -> Result<Model> {
    // Whitespace is kept so metadata text split around entity references
    // is reassembled intact
    let mut reader = Reader::from_reader(xml);

    let mut model = Model::new();
    let mut buf = Vec::with_capacity(XML_BUFFER_CAPACITY);
    let mut saw_model = false;
    let mut in_resources = false;
    let mut in_build = false;
    let mut current_object: Option<Object> = None;
    let mut current_mesh: Option<Mesh> = None;
    let mut current_metadata: Option<(String, String)> = None;
    let mut depth = 0usize;

    loop {
        let event_result = reader.read_event_into(&mut buf);
        let is_empty_element = matches!(&event_result, Ok(Event::Empty(_)));

        match event_result {
            Ok(Event::DocType(_)) => {
                return Err(Error::ParseError(
                    "DTD declarations are not allowed in model parts".to_string(),
                ));
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if !is_empty_element {
                    depth += 1;
                }
                let name = e.name();
                match get_local_name(name.as_ref()) {
                    b"model" => {
                        saw_model = true;
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| Error::ParseError(e.to_string()))?;
                            if attr.key.as_ref() == b"unit" {
                                model.unit = utf8(&attr.value)?.to_string();
                            }
                        }
                    }
                    b"metadata" if current_object.is_none() && !in_resources => {
                        let mut key = None;
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| Error::ParseError(e.to_string()))?;
                            if attr.key.as_ref() == b"name" {
                                key = Some(utf8(&attr.value)?.to_string());
                            }
                        }
                        if let Some(key) = key {
                            if is_empty_element {
                                model.metadata.push(MetadataEntry::new(key, String::new()));
                            } else {
                                current_metadata = Some((key, String::new()));
                            }
                        }
                    }
                    b"resources" => in_resources = !is_empty_element,
                    b"build" => in_build = !is_empty_element,
                    b"object" if in_resources => {
                        let object = parse_object(e)?;
                        if is_empty_element {
                            model.resources.objects.push(object);
                        } else {
                            current_object = Some(object);
                        }
                    }
                    b"mesh" if current_object.is_some() && !is_empty_element => {
                        current_mesh = Some(Mesh::new());
                    }
                    b"vertex" => {
                        if let Some(ref mut mesh) = current_mesh {
                            mesh.vertices.push(parse_vertex(e)?);
                        }
                    }
                    b"triangle" => {
                        if let Some(ref mut mesh) = current_mesh {
                            mesh.triangles.push(parse_triangle(e)?);
                        }
                    }
                    b"component" => {
                        if let Some(ref mut object) = current_object {
                            object.components.push(parse_component(e)?);
                        }
                    }
                    b"item" if in_build => {
                        model.build.items.push(parse_build_item(e)?);
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref t)) => {
                if let Some((_, ref mut value)) = current_metadata {
                    value.push_str(utf8(t)?);
                }
            }
            Ok(Event::GeneralRef(ref r)) => {
                if let Some((_, ref mut value)) = current_metadata {
                    value.push('&');
                    value.push_str(utf8(r)?);
                    value.push(';');
                }
            }
            Ok(Event::End(ref e)) => {
                depth = depth.saturating_sub(1);
                match get_local_name(e.name().as_ref()) {
                    b"metadata" => {
                        if let Some((key, raw)) = current_metadata.take() {
                            let value = quick_xml::escape::unescape(&raw)
                                .map(|v| v.trim().to_string())
                                .unwrap_or_else(|_| raw.trim().to_string());
                            model.metadata.push(MetadataEntry::new(key, value));
                        }
                    }
                    b"resources" => in_resources = false,
                    b"build" => in_build = false,
                    b"mesh" => {
                        if let (Some(object), Some(mesh)) = (current_object.as_mut(), current_mesh.take())
                        {
                            object.mesh = Some(mesh);
                        }
                    }
                    b"object" => {
                        if let Some(object) = current_object.take() {
                            model.resources.objects.push(object);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::ParseError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(Error::ParseError(
            "unexpected end of input inside an element".to_string(),
        ));
    }

    if !saw_model {
        return Err(Error::ParseError("no <model> root element".to_string()));
    }

    Ok(model)
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::ParseError(e.to_string()))
}
