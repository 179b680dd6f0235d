//! Single-plate extraction and build-volume validation

use crate::bounds::{Aabb, BoundsScope, bounds};
use crate::config::PrinterProfile;
use crate::error::{Error, Result, Warning};
use crate::opc::{PartTable, Rewrite, copy_package};
use crate::package::Package;
use crate::resolver::detect_plates;
use crate::xml::{Document, Element};
use nalgebra::Vector3;
use std::path::Path;
use tracing::{info, warn};

/// Z below which geometry counts as under the bed
const BELOW_BED_MM: f64 = -0.001;

/// Write a copy of `source` in which only `plate_id` is printable
///
/// Every build item is kept so vendor metadata that refers to items by
/// position stays consistent; the others are marked `printable="0"`. A
/// package with a single build item is copied unchanged.
pub fn extract_plate(source: &Path, plate_id: usize, dest: &Path) -> Result<()> {
    let parts = PartTable::from_path(source)?;
    let model_path = parts.model_path();
    let doc = Document::parse(&model_path, parts.read(&model_path)?)?;

    let item_count = doc
        .root()
        .child("build")
        .map(|b| b.children().filter(|e| e.local_name() == "item").count())
        .unwrap_or(0);

    if item_count == 0 {
        return Err(Error::EmptyOrInvalidBuildList(
            "build list has no items".to_string(),
        ));
    }
    if plate_id == 0 || plate_id > item_count {
        return Err(Error::InvalidParameter(format!(
            "plate {} out of range (1-{})",
            plate_id, item_count
        )));
    }
    if item_count == 1 {
        info!("single plate package, copying unchanged");
        return copy_package(source, dest);
    }

    let doc = doc.map_root(|root| {
        root.map_children(|child| {
            if child.local_name() != "build" {
                return child;
            }
            let mut position = 0;
            child.map_children(|item| mark_printable(item, &mut position, plate_id))
        })
    });

    let rewrite = Rewrite::new().replace(model_path, doc.to_bytes()?);
    parts.write_atomic(dest, &rewrite)?;
    info!(plate_id, plates = item_count, "extracted plate");
    Ok(())
}

fn mark_printable(item: Element, position: &mut usize, target: usize) -> Element {
    if item.local_name() != "item" {
        return item;
    }
    *position += 1;
    let printable = if *position == target { "1" } else { "0" };
    item.with_attr("printable", printable)
}

/// Result of checking a plate against a printer's build volume
#[derive(Debug, Clone, PartialEq)]
pub struct PlateValidation {
    /// Measured bounds, `None` when nothing had geometry
    pub aabb: Option<Aabb>,
    /// Edge lengths (zero without geometry)
    pub size: Vector3<f64>,
    /// Build volume and placement checks passed
    ///
    /// Informational multi-plate notes do not affect this.
    pub fits: bool,
    /// Whether the package has several plates
    pub is_multi_plate: bool,
    /// The plate that was checked, `None` for the combined layout
    pub validated_plate: Option<usize>,
    /// Everything worth telling the user
    pub warnings: Vec<Warning>,
}

/// Check one plate, or every plate combined, against `printer`
pub fn validate_plate(
    package: &Package,
    plate_id: Option<usize>,
    printer: &PrinterProfile,
) -> Result<PlateValidation> {
    let layout = detect_plates(package)?;
    let scope = match plate_id {
        Some(id) => BoundsScope::Plate(id),
        None => BoundsScope::Whole,
    };
    let report = bounds(package, scope)?;

    let size = report.aabb.map(|b| b.size()).unwrap_or_else(Vector3::zeros);
    let mut warnings = report.warnings;
    let mut problems = 0;

    let limits = [
        ("Width", size.x, printer.build_volume_x, "X"),
        ("Depth", size.y, printer.build_volume_y, "Y"),
        ("Height", size.z, printer.build_volume_z, "Z"),
    ];
    for (label, value, limit, axis) in limits {
        if value > limit {
            problems += 1;
            warnings.push(Warning::Note(format!(
                "{} exceeds build volume: {:.1}mm > {:.1}mm ({}-axis)",
                label, value, limit, axis
            )));
        }
    }

    if let Some(aabb) = report.aabb {
        if aabb.min.z < BELOW_BED_MM {
            problems += 1;
            warnings.push(Warning::Note(format!(
                "Objects extend below bed (Z_min = {:.1}mm)",
                aabb.min.z
            )));
        }
    }

    if layout.is_multi_plate {
        match plate_id {
            Some(id) => {
                if layout.plate(id).is_some_and(|p| !p.printable) {
                    warnings.push(Warning::Note(format!(
                        "Plate {} is marked as non-printable",
                        id
                    )));
                }
            }
            None => warnings.push(Warning::Note(format!(
                "Multi-plate file with {} plates; individual plates may fit even if combined bounds exceed build volume",
                layout.plates.len()
            ))),
        }
    }

    let fits = problems == 0;
    if warnings.is_empty() {
        info!(printer = %printer.name, "plate fits within build volume");
    } else {
        for w in &warnings {
            warn!(printer = %printer.name, "{}", w);
        }
    }

    Ok(PlateValidation {
        aabb: report.aabb,
        size,
        fits,
        is_multi_plate: layout.is_multi_plate,
        validated_plate: plate_id,
        warnings,
    })
}
