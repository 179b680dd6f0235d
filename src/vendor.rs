//! Slicer-vendor auxiliary parts
//!
//! Packages exported by desktop slicers carry extra parts next to the
//! geometry: per-object tool assignments and plate names in
//! `Metadata/model_settings.config`, the flat settings part, mid-print tool
//! changes and filament sequences. Everything here is read best-effort: a
//! missing or unreadable part degrades to an empty answer and a log line.

use crate::opc::PartTable;
use crate::xml::{Document, Element};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Per-object tool assignments, plate names, instances and assemblies
pub const MODEL_SETTINGS_PATH: &str = "Metadata/model_settings.config";
/// The flat JSON settings part
pub const PROJECT_SETTINGS_PATH: &str = "Metadata/project_settings.config";
/// Slice results from the exporting slicer
pub const SLICE_INFO_PATH: &str = "Metadata/slice_info.config";
/// Filament order and colors
pub const FILAMENT_SEQUENCE_PATH: &str = "Metadata/filament_sequence.json";
/// Mid-print layer events, including tool changes
pub const CUSTOM_GCODE_PATH: &str = "Metadata/custom_gcode_per_layer.xml";
/// Cut tool bookkeeping
pub const CUT_INFORMATION_PATH: &str = "Metadata/cut_information.xml";

/// Layer event type used for tool changes
const TOOL_CHANGE_EVENT: &str = "2";

/// Parts whose presence marks a package as slicer-vendor output
const VENDOR_MARKERS: [&str; 3] = [MODEL_SETTINGS_PATH, SLICE_INFO_PATH, FILAMENT_SEQUENCE_PATH];

/// Check if the package was exported by a slicer that adds vendor parts
pub fn is_vendor_package(parts: &PartTable) -> bool {
    VENDOR_MARKERS.iter().any(|p| parts.contains(p))
}

/// Parse an auxiliary XML part, logging and swallowing failures
pub(crate) fn read_xml(parts: &PartTable, name: &str) -> Option<Document> {
    let data = parts.get(name)?;
    match Document::parse(name, data) {
        Ok(doc) => Some(doc),
        Err(e) => {
            debug!(part = name, error = %e, "ignoring unreadable vendor part");
            None
        }
    }
}

/// Parse an auxiliary JSON part, logging and swallowing failures
pub(crate) fn read_json(parts: &PartTable, name: &str) -> Option<Value> {
    let data = parts.get(name)?;
    match serde_json::from_slice(data) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(part = name, error = %e, "ignoring unreadable vendor part");
            None
        }
    }
}

/// `<metadata key=".." value=".."/>` lookup among an element's direct children
pub(crate) fn metadata_value(element: &Element, key: &str) -> Option<String> {
    element
        .children()
        .filter(|m| m.local_name() == "metadata")
        .find(|m| m.attr("key").as_deref() == Some(key))
        .and_then(|m| m.attr("value").map(|v| v.into_owned()))
}

/// Raw `extruder` metadata values anywhere in the model settings
fn extruder_values(doc: &Document) -> Vec<String> {
    doc.root()
        .descendants("metadata")
        .into_iter()
        .filter(|m| m.attr("key").as_deref() == Some("extruder"))
        .filter_map(|m| m.attr("value").map(|v| v.into_owned()))
        .collect()
}

/// Sorted unique 1-based tool indices assigned to objects and parts
///
/// Values that are blank, non-numeric or zero are ignored.
pub fn assigned_tools(parts: &PartTable) -> Vec<u32> {
    let Some(doc) = read_xml(parts, MODEL_SETTINGS_PATH) else {
        return Vec::new();
    };
    let tools: BTreeSet<u32> = extruder_values(&doc)
        .iter()
        .filter_map(|v| v.trim().parse::<u32>().ok())
        .filter(|&t| t > 0)
        .collect();
    tools.into_iter().collect()
}

/// Multi-tool evidence found in vendor parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorSignals {
    /// Any vendor marker part is present
    pub is_vendor: bool,
    /// More than one distinct `extruder` value is assigned
    pub multi_tool_assignments: bool,
    /// The layer event part contains at least one tool change
    pub layer_tool_changes: bool,
    /// Highest assigned tool index, at least 1
    pub max_assigned_tool: u32,
}

impl VendorSignals {
    /// Inspect a package's vendor parts
    pub fn detect(parts: &PartTable) -> Self {
        let settings = read_xml(parts, MODEL_SETTINGS_PATH);

        let (multi_tool_assignments, max_assigned_tool) = match settings {
            Some(ref doc) => {
                let values = extruder_values(doc);
                let distinct: BTreeSet<&str> = values.iter().map(String::as_str).collect();
                let max = values
                    .iter()
                    .filter_map(|v| v.trim().parse::<u32>().ok())
                    .fold(1, u32::max);
                (distinct.len() > 1, max)
            }
            None => (false, 1),
        };

        let signals = Self {
            is_vendor: is_vendor_package(parts),
            multi_tool_assignments,
            layer_tool_changes: has_layer_tool_changes(parts),
            max_assigned_tool,
        };
        debug!(?signals, "detected vendor signals");
        signals
    }

    /// Whether per-object tool assignments must survive a rewrite
    pub fn needs_preservation(&self) -> bool {
        self.multi_tool_assignments || self.layer_tool_changes
    }
}

/// Check the layer event part for tool changes
pub fn has_layer_tool_changes(parts: &PartTable) -> bool {
    read_xml(parts, CUSTOM_GCODE_PATH).is_some_and(|doc| {
        doc.root()
            .descendants("layer")
            .iter()
            .any(|l| l.attr("type").as_deref() == Some(TOOL_CHANGE_EVENT))
    })
}

/// Names the vendor settings give to plates and objects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorNames {
    /// `plater_id` -> `plater_name`, non-empty names only
    pub plates: HashMap<usize, String>,
    /// Object id -> `name` metadata, non-empty names only
    pub objects: HashMap<usize, String>,
}

impl VendorNames {
    /// Read plate and object names from the model settings
    pub fn read(parts: &PartTable) -> Self {
        let mut names = Self::default();
        let Some(doc) = read_xml(parts, MODEL_SETTINGS_PATH) else {
            return names;
        };

        for element in doc.root().children() {
            match element.local_name() {
                "plate" => {
                    let id = metadata_value(element, "plater_id")
                        .and_then(|v| v.trim().parse::<usize>().ok());
                    let name = metadata_value(element, "plater_name")
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty());
                    if let (Some(id), Some(name)) = (id, name) {
                        if id > 0 {
                            names.plates.insert(id, name);
                        }
                    }
                }
                "object" => {
                    let id = element
                        .attr("id")
                        .and_then(|v| v.trim().parse::<usize>().ok());
                    let name = metadata_value(element, "name")
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty());
                    if let (Some(id), Some(name)) = (id, name) {
                        names.objects.insert(id, name);
                    }
                }
                _ => {}
            }
        }
        names
    }
}

fn normalize_color(raw: &str) -> String {
    if raw.starts_with('#') {
        raw.to_string()
    } else {
        format!("#{}", raw)
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn push_unique(colors: &mut Vec<String>, color: String) {
    if !color.is_empty() && !colors.contains(&color) {
        colors.push(color);
    }
}

/// Filament colors used by the package, in first-seen order
///
/// Sources, in order: the filament sequence part, the settings part and
/// `extruder_colour` model metadata. When the settings part describes a
/// single-nozzle painted job with several filaments, all of its filament
/// colors are returned; when tools are assigned to objects, only the colors
/// of those tools are returned.
pub fn detect_colors(parts: &PartTable) -> Vec<String> {
    let mut colors = Vec::new();

    if let Some(seq) = read_json(parts, FILAMENT_SEQUENCE_PATH) {
        if let Some(Value::Array(info)) = seq.get("filament_info") {
            for filament in info {
                let color = filament.get("color").and_then(Value::as_str).unwrap_or("#FFFFFF");
                push_unique(&mut colors, normalize_color(color));
            }
        }
        if let Value::Object(map) = &seq {
            for plate in map.values() {
                if let Some(Value::Array(sequence)) = plate.get("sequence") {
                    for filament in sequence {
                        let color =
                            filament.get("color").and_then(Value::as_str).unwrap_or("#FFFFFF");
                        push_unique(&mut colors, normalize_color(color));
                    }
                }
            }
        }
    }

    if let Some(settings) = read_json(parts, PROJECT_SETTINGS_PATH) {
        let filament_colors = string_list(settings.get("filament_colour"));
        let single_nozzle = match settings.get("single_extruder_multi_material") {
            Some(Value::String(s)) => s == "1",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::Bool(b)) => *b,
            _ => false,
        };

        if single_nozzle && filament_colors.len() > 1 {
            let painted: Vec<String> = filament_colors
                .iter()
                .filter(|c| !c.is_empty())
                .cloned()
                .collect();
            if !painted.is_empty() {
                return painted;
            }
        }

        let tools = assigned_tools(parts);
        if !tools.is_empty() {
            let mut active = Vec::new();
            for tool in tools {
                if let Some(color) = filament_colors.get(tool as usize - 1) {
                    push_unique(&mut active, color.clone());
                }
            }
            if !active.is_empty() {
                return active;
            }
        }

        for color in string_list(settings.get("extruder_colour")) {
            push_unique(&mut colors, color);
        }
        for color in filament_colors {
            push_unique(&mut colors, color);
        }
    }

    let model_path = parts.model_path();
    if let Some(doc) = read_xml(parts, &model_path) {
        for meta in doc.root().children().filter(|e| e.local_name() == "metadata") {
            let is_colour = meta
                .attr("name")
                .is_some_and(|n| crate::xml::local_name(&n) == "extruder_colour");
            if !is_colour {
                continue;
            }
            let raw = meta.attr("value").map(|v| v.into_owned()).unwrap_or_else(|| meta.text());
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw.trim()) {
                for item in items.iter().filter_map(Value::as_str) {
                    push_unique(&mut colors, item.to_string());
                }
            }
        }
    }

    colors
}
