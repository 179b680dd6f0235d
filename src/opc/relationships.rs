//! Relationship discovery

use super::{MODEL_REL_TYPE, normalize_path};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Default package relationships pointing at the geometry part
pub(crate) const DEFAULT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// Find the target of the 3D model relationship in a `.rels` part
///
/// Returns `None` if the part does not parse or holds no model relationship.
pub(super) fn find_model_target(rels: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(rels);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if !e.name().as_ref().ends_with(b"Relationship") {
                    buf.clear();
                    continue;
                }

                let mut target = None;
                let mut rel_type = None;
                for attr in e.attributes().flatten() {
                    let Ok(value) = std::str::from_utf8(&attr.value) else {
                        continue;
                    };
                    match attr.key.as_ref() {
                        b"Target" => target = Some(value.to_string()),
                        b"Type" => rel_type = Some(value.to_string()),
                        _ => {}
                    }
                }

                if let (Some(t), Some(rt)) = (target, rel_type) {
                    if rt == MODEL_REL_TYPE {
                        let decoded = urlencoding::decode(&t)
                            .map(|s| s.into_owned())
                            .unwrap_or(t);
                        return Some(normalize_path(&decoded).to_string());
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}
