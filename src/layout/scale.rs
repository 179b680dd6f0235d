//! Uniform and offset-only scale rewrites

use crate::error::{Error, Result};
use crate::opc::{PartTable, Rewrite, copy_package};
use crate::transform::{Layout, Transform, format_number};
use crate::vendor::MODEL_SETTINGS_PATH;
use crate::xml::{Document, Element};
use std::path::Path;
use tracing::{debug, info};

/// Percentages this close to 100 leave the package untouched
const IDENTITY_EPSILON: f64 = 0.001;

/// Which transforms a scale rewrite touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    /// Scale build item geometry and nested component offsets
    ///
    /// Top-level item translations stay put so plates do not drift.
    #[default]
    Full,
    /// Scale only nested component offsets and vendor assembly matrices
    ///
    /// For slicers that resize geometry themselves but not the spacing
    /// inside assemblies.
    OffsetsOnly,
}

/// Write a scaled copy of `source` to `dest`
///
/// Every geometry part (`*.model`) is rewritten. In [`ScaleMode::Full`] each
/// build item's linear part is multiplied by `scale_percent / 100` (an item
/// without a transform receives a pure scale) and component translations are
/// scaled. In [`ScaleMode::OffsetsOnly`] only component translations and the
/// translations of vendor `matrix` metadata are scaled. Transforms that are
/// not numeric or have the wrong number of values are left as they are.
pub fn scale(source: &Path, dest: &Path, scale_percent: f64, mode: ScaleMode) -> Result<()> {
    if !scale_percent.is_finite() || scale_percent <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "scale percentage must be positive, got {}",
            scale_percent
        )));
    }
    if (scale_percent - 100.0).abs() < IDENTITY_EPSILON {
        info!("scale is 100%, copying unchanged");
        return copy_package(source, dest);
    }

    let factor = scale_percent / 100.0;
    let parts = PartTable::from_path(source)?;
    let rewrite = scale_rewrite(&parts, factor, mode)?;
    parts.write_atomic(dest, &rewrite)?;
    info!(percent = scale_percent, ?mode, "scaled package");
    Ok(())
}

fn scale_rewrite(parts: &PartTable, factor: f64, mode: ScaleMode) -> Result<Rewrite> {
    let mut rewrite = Rewrite::new();

    for part in parts.parts().filter(|p| !p.is_dir && p.name.ends_with(".model")) {
        let doc = Document::parse(&part.name, &part.data)?;
        let doc = doc.map_root(|root| root.map_tree(&mut |e| scale_model_element(e, factor, mode)));
        rewrite.set(part.name.as_str(), doc.to_bytes()?);
        debug!(part = %part.name, "scaled geometry part");
    }

    if mode == ScaleMode::OffsetsOnly {
        if let Some(data) = parts.get(MODEL_SETTINGS_PATH) {
            let doc = Document::parse(MODEL_SETTINGS_PATH, data)?;
            let doc = doc.map_root(|root| root.map_tree(&mut |e| scale_assembly_matrix(e, factor)));
            rewrite.set(MODEL_SETTINGS_PATH, doc.to_bytes()?);
        }
    }

    Ok(rewrite)
}

/// Rewrite `key` when it holds a transform in `layout`, otherwise keep it
fn rescale_attr(
    element: Element,
    key: &str,
    layout: Layout,
    f: impl FnOnce(Transform) -> Transform,
) -> Element {
    let scaled = element
        .attr(key)
        .and_then(|value| Transform::parse(&value).ok().flatten())
        .filter(|t| t.layout() == layout)
        .map(|t| f(t).to_attr());
    match scaled {
        Some(value) => element.with_attr(key, &value),
        None => element,
    }
}

fn scale_model_element(element: Element, factor: f64, mode: ScaleMode) -> Element {
    let is_item = element.local_name() == "item";
    let is_component = element.local_name() == "component";

    if is_item && mode == ScaleMode::Full {
        if element.attr("transform").is_none() {
            let s = format_number(factor);
            let value = format!("{s} 0 0 0 {s} 0 0 0 {s} 0 0 0");
            return element.with_attr("transform", &value);
        }
        rescale_attr(element, "transform", Layout::Affine3x4, |t| {
            t.scale_linear(factor)
        })
    } else if is_component {
        rescale_attr(element, "transform", Layout::Affine3x4, |t| {
            t.scale_translation(factor)
        })
    } else {
        element
    }
}

fn scale_assembly_matrix(element: Element, factor: f64) -> Element {
    if element.local_name() != "metadata" || element.attr("key").as_deref() != Some("matrix") {
        return element;
    }
    rescale_attr(element, "value", Layout::RowMajor4x4, |t| {
        t.scale_translation(factor)
    })
}
