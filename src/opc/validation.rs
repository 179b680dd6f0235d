//! Structural checks for written packages and part names

use super::{CONTENT_TYPES_PATH, CORE_NAMESPACE, PartTable, RELS_PATH};
use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Check that a package carries the parts every 3MF consumer requires
///
/// Verifies `[Content_Types].xml`, `_rels/.rels` and the geometry part are
/// present, and that the geometry part's root element declares the 3MF core
/// namespace.
pub fn validate_package(parts: &PartTable) -> Result<()> {
    for required in [CONTENT_TYPES_PATH, RELS_PATH] {
        if !parts.contains(required) {
            return Err(Error::MissingRequiredPart(required.to_string()));
        }
    }

    let model_path = parts.model_path();
    let model = parts
        .get(&model_path)
        .ok_or_else(|| Error::MissingRequiredPart(model_path.clone()))?;

    if !root_declares_core_namespace(&model_path, model)? {
        return Err(Error::malformed(
            &model_path,
            format!("root element does not declare namespace {}", CORE_NAMESPACE),
        ));
    }

    Ok(())
}

/// Read up to the first element and check its namespace declarations
fn root_declares_core_namespace(part: &str, xml: &[u8]) -> Result<bool> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| Error::malformed(part, e.to_string()))?;
                    if attr.key.as_ref().starts_with(b"xmlns")
                        && attr.value.as_ref() == CORE_NAMESPACE.as_bytes()
                    {
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
            Ok(Event::Eof) => return Err(Error::malformed(part, "no root element")),
            Err(e) => return Err(Error::malformed(part, e.to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Validate OPC part name according to OPC specification constraints
///
/// Non-ASCII names are accepted; many real-world files carry UTF-8 part
/// names directly rather than percent-encoding them.
pub(crate) fn validate_opc_part_name(part_name: &str) -> Result<()> {
    if part_name.chars().any(|c| c.is_control()) {
        return Err(Error::InvalidParameter(format!(
            "Part name cannot contain control characters: {}",
            part_name.escape_debug()
        )));
    }

    if part_name.contains('#') || part_name.contains('?') {
        return Err(Error::InvalidParameter(format!(
            "Part name cannot contain a fragment or query string: {}",
            part_name
        )));
    }

    for (idx, segment) in part_name.split('/').enumerate() {
        if segment.is_empty() {
            // Leading slash creates an empty first segment
            if idx == 0 && part_name.starts_with('/') {
                continue;
            }
            return Err(Error::InvalidParameter(format!(
                "Part name cannot contain empty path segments: {}",
                part_name
            )));
        }

        if segment == "." || segment == ".." || segment.ends_with('.') {
            return Err(Error::InvalidParameter(format!(
                "Part name cannot contain '.' or '..' segments or segments ending with '.': {}",
                part_name
            )));
        }
    }

    Ok(())
}

/// Normalize OPC path by removing leading slash
pub(crate) fn normalize_path(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_name_rules() {
        assert!(validate_opc_part_name("Metadata/project_settings.config").is_ok());
        assert!(validate_opc_part_name("/3D/Objects/object_1.model").is_ok());
        assert!(validate_opc_part_name("3D//x.model").is_err());
        assert!(validate_opc_part_name("3D/../x.model").is_err());
        assert!(validate_opc_part_name("3D/x.model#frag").is_err());
        assert!(validate_opc_part_name("3D/x\n.model").is_err());
    }

    #[test]
    fn test_root_namespace_check() {
        let ok = br#"<?xml version="1.0"?><model xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02"/>"#;
        assert!(root_declares_core_namespace("m", ok).unwrap());

        let wrong = br#"<model xmlns="urn:something-else"/>"#;
        assert!(!root_declares_core_namespace("m", wrong).unwrap());
    }
}
