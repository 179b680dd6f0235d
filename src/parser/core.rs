//! Core 3MF element parsing
//!
//! Handles objects, vertices, triangles, components and build items. Parsing
//! is lenient about attributes it does not know: slicer vendors add their own
//! freely, so only the values the resource graph needs are read and checked.

use crate::error::{Error, Result};
use crate::model::*;
use crate::transform::parse_values;
use quick_xml::events::BytesStart;

use super::get_local_name;

fn attr_str(value: &[u8]) -> Result<&str> {
    std::str::from_utf8(value).map_err(|e| Error::ParseError(e.to_string()))
}

fn unescape_attr(value: &[u8]) -> Result<String> {
    let s = attr_str(value)?;
    quick_xml::escape::unescape(s)
        .map(|v| v.into_owned())
        .map_err(|e| Error::ParseError(e.to_string()))
}

fn parse_usize(field: &str, value: &[u8]) -> Result<usize> {
    let s = attr_str(value)?;
    s.trim()
        .parse::<usize>()
        .map_err(|_| Error::parse_error_with_context(field, s, "non-negative integer"))
}

fn parse_coordinate(field: &str, value: &[u8]) -> Result<f64> {
    let s = attr_str(value)?;
    let v = s
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::parse_error_with_context(field, s, "number"))?;
    // Reject NaN and Infinity
    if !v.is_finite() {
        return Err(Error::ParseError(format!(
            "Vertex {} coordinate must be finite (got {})",
            field, v
        )));
    }
    Ok(v)
}

/// Parse object element attributes
pub(super) fn parse_object(e: &BytesStart) -> Result<Object> {
    let mut id = None;
    let mut name = None;
    let mut object_type = ObjectType::Model;

    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"id" => id = Some(parse_usize("object id", &attr.value)?),
            b"name" => name = Some(unescape_attr(&attr.value)?),
            b"type" => object_type = ObjectType::from_attr(attr_str(&attr.value)?),
            _ => {}
        }
    }

    let id = id.ok_or_else(|| Error::ParseError("Object missing id attribute".to_string()))?;
    let mut object = Object::new(id);
    object.name = name;
    object.object_type = object_type;
    Ok(object)
}

/// Parse vertex element attributes
pub(super) fn parse_vertex(e: &BytesStart) -> Result<Vertex> {
    let mut x = None;
    let mut y = None;
    let mut z = None;

    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"x" => x = Some(parse_coordinate("x", &attr.value)?),
            b"y" => y = Some(parse_coordinate("y", &attr.value)?),
            b"z" => z = Some(parse_coordinate("z", &attr.value)?),
            _ => {}
        }
    }

    match (x, y, z) {
        (Some(x), Some(y), Some(z)) => Ok(Vertex::new(x, y, z)),
        _ => Err(Error::ParseError(
            "Vertex requires x, y and z attributes".to_string(),
        )),
    }
}

/// Parse triangle element attributes
///
/// Property indices (`pid`, `p1`..`p3`) and vendor paint attributes are
/// ignored.
pub(super) fn parse_triangle(e: &BytesStart) -> Result<Triangle> {
    let mut v1 = None;
    let mut v2 = None;
    let mut v3 = None;

    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"v1" => v1 = Some(parse_usize("triangle v1", &attr.value)?),
            b"v2" => v2 = Some(parse_usize("triangle v2", &attr.value)?),
            b"v3" => v3 = Some(parse_usize("triangle v3", &attr.value)?),
            _ => {}
        }
    }

    match (v1, v2, v3) {
        (Some(v1), Some(v2), Some(v3)) => Ok(Triangle::new(v1, v2, v3)),
        _ => Err(Error::ParseError(
            "Triangle requires v1, v2 and v3 attributes".to_string(),
        )),
    }
}

/// Parse component element attributes
///
/// The production extension `path` attribute is matched by local name so any
/// namespace prefix works. The stored path is percent-decoded and has its
/// leading slash removed, matching archive entry names.
pub(super) fn parse_component(e: &BytesStart) -> Result<Component> {
    let mut objectid = None;
    let mut transform = None;
    let mut path = None;

    for attr in e.attributes() {
        let attr = attr?;
        match get_local_name(attr.key.as_ref()) {
            b"objectid" => objectid = Some(parse_usize("component objectid", &attr.value)?),
            b"transform" => transform = Some(parse_values(attr_str(&attr.value)?)?),
            b"path" => {
                let raw = unescape_attr(&attr.value)?;
                let decoded = urlencoding::decode(&raw)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| raw.to_string());
                path = Some(decoded.trim_start_matches('/').to_string());
            }
            _ => {}
        }
    }

    let objectid = objectid
        .ok_or_else(|| Error::ParseError("Component missing objectid attribute".to_string()))?;
    let mut component = Component::new(objectid);
    component.transform = transform;
    component.path = path.filter(|p| !p.is_empty());
    Ok(component)
}

/// Parse build item element attributes
pub(super) fn parse_build_item(e: &BytesStart) -> Result<BuildItem> {
    let mut objectid = None;
    let mut transform = None;
    let mut printable = true;

    for attr in e.attributes() {
        let attr = attr?;
        match get_local_name(attr.key.as_ref()) {
            b"objectid" => objectid = Some(parse_usize("item objectid", &attr.value)?),
            b"transform" => transform = Some(parse_values(attr_str(&attr.value)?)?),
            b"printable" => printable = attr_str(&attr.value)?.trim() != "0",
            _ => {}
        }
    }

    let objectid = objectid
        .ok_or_else(|| Error::ParseError("Build item missing objectid attribute".to_string()))?;
    let mut item = BuildItem::new(objectid);
    item.transform = transform;
    item.printable = printable;
    Ok(item)
}
