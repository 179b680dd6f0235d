//! Grid duplication of a single printable object

use super::grid::{estimate_max_copies, fits_bed, grid_positions, grid_shape};
use crate::bounds::object_dimensions;
use crate::config::BedSize;
use crate::error::{Error, Result};
use crate::opc::{Rewrite, copy_package};
use crate::package::Package;
use crate::transform::Transform;
use crate::vendor::MODEL_SETTINGS_PATH;
use crate::xml::{Document, Element};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// First `identify_id` handed out to regenerated vendor instances
const FIRST_IDENTIFY_ID: usize = 231;

/// Parameters of a duplication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateRequest {
    /// Total number of copies, the original included
    pub copies: usize,
    /// Gap between neighbouring copies in mm
    pub spacing: f64,
    /// Multiplier applied to the footprint and spacing before layout
    ///
    /// Used when the slicer scales the job after placement.
    pub layout_scale_factor: f64,
}

impl Default for DuplicateRequest {
    fn default() -> Self {
        Self {
            copies: 1,
            spacing: 5.0,
            layout_scale_factor: 1.0,
        }
    }
}

impl DuplicateRequest {
    /// Request `copies` copies with default spacing
    pub fn new(copies: usize) -> Self {
        Self {
            copies,
            ..Default::default()
        }
    }

    /// Set the gap between copies
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the layout scale factor
    pub fn with_layout_scale_factor(mut self, factor: f64) -> Self {
        self.layout_scale_factor = factor;
        self
    }
}

/// What a duplication produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Copies written
    pub copies: usize,
    /// Grid columns
    pub cols: usize,
    /// Grid rows
    pub rows: usize,
    /// Whether every copy lies on the bed
    pub fits_bed: bool,
    /// Estimated capacity of the bed for this footprint
    pub max_copies: usize,
    /// Width, depth and height of the object, rounded to 0.1 mm
    pub object_dimensions: [f64; 3],
}

/// Write `request.copies` copies of the package's printable object to `dest`
///
/// The source must place exactly one printable item. Every build item is
/// replaced by one item per copy with identity rotation, the grid position
/// and the original Z offset. Vendor plate instances and assembly entries
/// are deleted and regenerated to match the new items one to one.
pub fn duplicate(
    source: &Path,
    dest: &Path,
    request: &DuplicateRequest,
    bed: &BedSize,
) -> Result<DuplicateReport> {
    if request.copies < 1 {
        return Err(Error::InvalidParameter(format!(
            "copy count must be at least 1, got {}",
            request.copies
        )));
    }
    if !(request.layout_scale_factor > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "layout scale factor must be positive, got {}",
            request.layout_scale_factor
        )));
    }

    let package = Package::open(source)?;
    let printable = package
        .model()
        .build
        .items
        .iter()
        .filter(|item| item.printable)
        .count();
    match printable {
        0 => {
            return Err(Error::EmptyOrInvalidBuildList(
                "no printable build item to duplicate".to_string(),
            ));
        }
        1 => {}
        n => {
            return Err(Error::InvalidParameter(format!(
                "duplication needs exactly one printable build item, found {}",
                n
            )));
        }
    }

    let dims = object_dimensions(&package)?;
    let factor = request.layout_scale_factor;
    let (width, depth, spacing) = (dims.x * factor, dims.y * factor, request.spacing * factor);
    info!(
        width = dims.x,
        depth = dims.y,
        height = dims.z,
        layout_scale = factor,
        "measured object"
    );

    let max_copies = estimate_max_copies(bed, width, depth, spacing);
    let object_dimensions = [round1(dims.x), round1(dims.y), round1(dims.z)];

    if request.copies == 1 {
        copy_package(source, dest)?;
        return Ok(DuplicateReport {
            copies: 1,
            cols: 1,
            rows: 1,
            fits_bed: true,
            max_copies,
            object_dimensions,
        });
    }

    let positions = grid_positions(bed, width, depth, request.copies, spacing)?;
    let fits = fits_bed(bed, width, depth, request.copies, spacing)?;
    let (cols, rows) = grid_shape(request.copies);

    let parts = package.parts();
    let model_path = package.model_path();
    let doc = Document::parse(model_path, parts.read(model_path)?)?;
    let template = template_item(&doc)?;
    let doc = doc.map_root(|root| replace_build_items(root, &template, &positions));

    let mut rewrite = Rewrite::new().replace(model_path, doc.to_bytes()?);
    if let Some(data) = parts.get(MODEL_SETTINGS_PATH) {
        let settings = Document::parse(MODEL_SETTINGS_PATH, data)?;
        let settings = settings.map_root(|root| {
            regenerate_instances(root, &template.object_id, &positions, template.z)
        });
        rewrite.set(MODEL_SETTINGS_PATH, settings.to_bytes()?);
        debug!(instances = positions.len(), "regenerated vendor instances");
    }

    parts.write_atomic(dest, &rewrite)?;
    info!(copies = request.copies, cols, rows, fits, "duplicated object");

    Ok(DuplicateReport {
        copies: request.copies,
        cols,
        rows,
        fits_bed: fits,
        max_copies,
        object_dimensions,
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// The printable item every copy is modelled on
struct Template {
    element_name: String,
    object_id: String,
    z: f64,
}

fn template_item(doc: &Document) -> Result<Template> {
    let build = doc
        .root()
        .child("build")
        .ok_or_else(|| Error::EmptyOrInvalidBuildList("package has no build element".to_string()))?;
    let item = build
        .children()
        .filter(|e| e.local_name() == "item")
        .find(|e| e.attr("printable").as_deref() != Some("0"))
        .ok_or_else(|| {
            Error::EmptyOrInvalidBuildList("no printable build item to duplicate".to_string())
        })?;

    let object_id = item
        .attr("objectid")
        .map(|v| v.into_owned())
        .ok_or_else(|| Error::EmptyOrInvalidBuildList("build item without objectid".to_string()))?;
    let z = match item.attr("transform") {
        Some(attr) => Transform::parse(&attr)?
            .map(|t| t.translation_part().z)
            .unwrap_or(0.0),
        None => 0.0,
    };

    Ok(Template {
        element_name: item.name().to_string(),
        object_id,
        z,
    })
}

fn placement_attr(x: f64, y: f64, z: f64) -> String {
    format!("1 0 0 0 1 0 0 0 1 {:.4} {:.4} {:.4}", x, y, z)
}

fn replace_build_items(root: Element, template: &Template, positions: &[(f64, f64)]) -> Element {
    root.map_children(|child| {
        if child.local_name() != "build" {
            return child;
        }
        let items = positions.iter().map(|&(x, y)| {
            Element::new(template.element_name.as_str())
                .with_attr("objectid", &template.object_id)
                .with_attr("transform", &placement_attr(x, y, template.z))
                .with_attr("printable", "1")
        });
        child
            .retain_children(|c| c.local_name() != "item")
            .with_indented_children(items)
    })
}

fn metadata(key: &str, value: &str) -> Element {
    Element::new("metadata")
        .with_attr("key", key)
        .with_attr("value", value)
}

/// Rebuild `<plate>/<model_instance>` and `<assemble>/<assemble_item>`
///
/// Missing containers are created. Only the first plate and the first
/// assembly are touched.
fn regenerate_instances(
    root: Element,
    object_id: &str,
    positions: &[(f64, f64)],
    z: f64,
) -> Element {
    let root = if root.child("plate").is_some() {
        root
    } else {
        root.with_indented_children([Element::new("plate")
            .with_child(metadata("plater_id", "1"))
            .with_child(metadata("plater_name", ""))])
    };
    let root = if root.child("assemble").is_some() {
        root
    } else {
        root.with_indented_children([Element::new("assemble")])
    };

    let mut plate_done = false;
    let mut assemble_done = false;
    root.map_children(|child| {
        let is_plate = child.local_name() == "plate";
        let is_assemble = child.local_name() == "assemble";

        if is_plate && !plate_done {
            plate_done = true;
            let instances = (0..positions.len()).map(|idx| {
                Element::new("model_instance")
                    .with_child(metadata("object_id", object_id))
                    .with_child(metadata("instance_id", &idx.to_string()))
                    .with_child(metadata(
                        "identify_id",
                        &(FIRST_IDENTIFY_ID + idx).to_string(),
                    ))
            });
            child
                .retain_children(|c| c.local_name() != "model_instance")
                .with_indented_children(instances)
        } else if is_assemble && !assemble_done {
            assemble_done = true;
            let entries = positions.iter().enumerate().map(|(idx, &(x, y))| {
                Element::new("assemble_item")
                    .with_attr("object_id", object_id)
                    .with_attr("instance_id", &idx.to_string())
                    .with_attr("transform", &placement_attr(x, y, z))
                    .with_attr("offset", "0 0 0")
            });
            child
                .retain_children(|c| c.local_name() != "assemble_item")
                .with_indented_children(entries)
        } else {
            child
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<config>
  <object id="3">
    <metadata key="name" value="Cube"/>
  </object>
  <plate>
    <metadata key="plater_id" value="1"/>
    <model_instance>
      <metadata key="object_id" value="3"/>
    </model_instance>
  </plate>
  <assemble>
    <assemble_item object_id="3" instance_id="0" transform="1 0 0 0 1 0 0 0 1 0 0 0" offset="0 0 0"/>
  </assemble>
</config>
"#;

    #[test]
    fn test_regenerate_replaces_stale_entries() {
        let doc = Document::parse("s", SETTINGS.as_bytes()).unwrap();
        let positions = [(10.0, 20.0), (30.0, 20.0), (10.0, 40.0)];
        let doc = doc.map_root(|root| regenerate_instances(root, "3", &positions, 1.5));

        let plate = doc.root().child("plate").unwrap();
        let instances: Vec<_> = plate.children().filter(|c| c.local_name() == "model_instance").collect();
        assert_eq!(instances.len(), 3);
        assert_eq!(
            crate::vendor::metadata_value(instances[2], "identify_id").as_deref(),
            Some("233")
        );

        let assemble = doc.root().child("assemble").unwrap();
        let items: Vec<_> = assemble.children().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[1].attr("transform").as_deref(),
            Some("1 0 0 0 1 0 0 0 1 30.0000 20.0000 1.5000")
        );
        // unrelated content untouched
        assert!(doc.root().child("object").is_some());
    }

    #[test]
    fn test_regenerate_creates_missing_containers() {
        let doc = Document::parse("s", b"<config></config>").unwrap();
        let doc = doc.map_root(|root| regenerate_instances(root, "7", &[(1.0, 2.0)], 0.0));
        let plate = doc.root().child("plate").unwrap();
        assert_eq!(
            crate::vendor::metadata_value(plate, "plater_id").as_deref(),
            Some("1")
        );
        assert_eq!(plate.children().filter(|c| c.local_name() == "model_instance").count(), 1);
        assert_eq!(doc.root().child("assemble").unwrap().children().count(), 1);
    }

    #[test]
    fn test_template_keeps_z() {
        let xml = br#"<model><build><item objectid="1" printable="0"/><item objectid="2" transform="1 0 0 0 1 0 0 0 1 5 6 7.25"/></build></model>"#;
        let doc = Document::parse("m", xml).unwrap();
        let template = template_item(&doc).unwrap();
        assert_eq!(template.object_id, "2");
        assert_eq!(template.z, 7.25);
    }

    #[test]
    fn test_request_defaults() {
        let req = DuplicateRequest::new(4);
        assert_eq!(req.spacing, 5.0);
        assert_eq!(req.layout_scale_factor, 1.0);
    }
}
