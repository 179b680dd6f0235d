//! Embedding merged settings into a package

use super::cache::ProfileCache;
use super::keys::{KeyKind, Profile, ProfileKey, as_list, numeric};
use super::rebuild::rebuild_clean;
use crate::error::{Error, Result};
use crate::opc::{PartTable, Rewrite};
use crate::package::Package;
use crate::vendor::{
    CUT_INFORMATION_PATH, FILAMENT_SEQUENCE_PATH, MODEL_SETTINGS_PATH, PROJECT_SETTINGS_PATH,
    SLICE_INFO_PATH, VendorSignals,
};
use crate::xml::{Document, Element};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Preview image prefixes dropped from embedded packages
const PREVIEW_PREFIXES: [&str; 3] = ["Metadata/plate", "Metadata/top", "Metadata/pick"];

/// Smallest half-width reserved around the prime tower, in mm
const MIN_TOWER_HALF_SPAN_MM: f64 = 12.0;
const DEFAULT_TOWER_WIDTH_MM: f64 = 35.0;
const DEFAULT_TOWER_BRIM_MM: f64 = 3.0;

/// Embedder settings that describe the target hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Independent tool slots on the printer
    pub max_tools: usize,
    /// Square bed edge used to keep the prime tower on the bed, in mm
    pub bed_size_mm: f64,
    /// Extra clearance around the prime tower, in mm
    pub tower_margin_mm: f64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            max_tools: 4,
            bed_size_mm: 270.0,
            tower_margin_mm: 6.0,
        }
    }
}

impl EmbedConfig {
    /// Set the number of tool slots
    pub fn with_max_tools(mut self, max_tools: usize) -> Self {
        self.max_tools = max_tools;
        self
    }

    /// Set the bed edge length
    pub fn with_bed_size(mut self, bed_size_mm: f64) -> Self {
        self.bed_size_mm = bed_size_mm;
        self
    }

    /// Set the prime tower clearance
    pub fn with_tower_margin(mut self, margin_mm: f64) -> Self {
        self.tower_margin_mm = margin_mm;
        self
    }
}

/// Per-job inputs to an embed
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedRequest {
    /// Material settings chosen for the job
    pub filament_settings: Profile,
    /// User overrides, applied last
    pub overrides: Profile,
    /// Tools the job asks for
    pub requested_tool_count: usize,
    /// Old tool index to new tool index for vendor per-object assignments
    pub tool_remap: BTreeMap<u32, u32>,
    /// Keep vendor geometry instead of re-exporting it
    pub preserve_geometry: bool,
}

impl Default for EmbedRequest {
    fn default() -> Self {
        Self {
            filament_settings: Profile::new(),
            overrides: Profile::new(),
            requested_tool_count: 1,
            tool_remap: BTreeMap::new(),
            preserve_geometry: false,
        }
    }
}

impl EmbedRequest {
    /// Request `tools` tool slots
    pub fn with_tool_count(mut self, tools: usize) -> Self {
        self.requested_tool_count = tools;
        self
    }

    /// Set the material settings
    pub fn with_filament_settings(mut self, settings: Profile) -> Self {
        self.filament_settings = settings;
        self
    }

    /// Set the overrides
    pub fn with_overrides(mut self, overrides: Profile) -> Self {
        self.overrides = overrides;
        self
    }

    /// Remap vendor tool assignments
    pub fn with_tool_remap(mut self, remap: BTreeMap<u32, u32>) -> Self {
        self.tool_remap = remap;
        self
    }

    /// Keep vendor geometry as is
    pub fn with_preserve_geometry(mut self, preserve: bool) -> Self {
        self.preserve_geometry = preserve;
        self
    }
}

/// Which branch an embed took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedPath {
    /// Vendor settings and tool assignments were kept and extended
    PreserveAssignments,
    /// Settings were merged onto the package as is
    Merged,
    /// Geometry was re-exported into a clean package first
    Rebuilt,
}

/// What an embed did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedReport {
    /// Branch taken
    pub path: EmbedPath,
    /// Length of every per-tool settings array
    pub tool_slots: usize,
    /// Vendor evidence the decision was based on
    pub signals: VendorSignals,
    /// Keys in the written settings part
    pub settings_keys: usize,
}

/// Writes merged settings into packages
///
/// Borrows a [`ProfileCache`] so many embeds can share one set of loaded
/// profiles.
#[derive(Debug, Clone)]
pub struct ProfileEmbedder<'a> {
    cache: &'a ProfileCache,
    config: EmbedConfig,
}

impl<'a> ProfileEmbedder<'a> {
    /// Create an embedder over loaded profiles
    pub fn new(cache: &'a ProfileCache, config: EmbedConfig) -> Self {
        Self { cache, config }
    }

    /// The hardware configuration in use
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Embed settings into `source`, writing the result to `dest`
    ///
    /// Vendor packages with multi-tool evidence and more than one requested
    /// tool keep their settings part and tool assignments; other vendor
    /// packages are re-exported unless `preserve_geometry` is set. See
    /// [`EmbedPath`].
    pub fn embed(&self, source: &Path, dest: &Path, request: &EmbedRequest) -> Result<EmbedReport> {
        let parts = PartTable::from_path(source)?;
        let signals = VendorSignals::detect(&parts);

        let preserve =
            signals.is_vendor && request.requested_tool_count > 1 && signals.needs_preservation();

        let (path, working, settings, tool_slots) = if preserve {
            info!(
                layer_changes = signals.layer_tool_changes,
                assignments = signals.multi_tool_assignments,
                "preserving vendor tool assignments"
            );
            let base = existing_settings(&parts)?;
            let slots = (signals.max_assigned_tool as usize)
                .max(request.requested_tool_count)
                .max(1);
            self.check_tool_count(slots)?;
            let settings = self.preserving_settings(base, request, slots);
            (EmbedPath::PreserveAssignments, parts, settings, slots)
        } else {
            let slots = request.requested_tool_count.max(1);
            self.check_tool_count(slots)?;
            let settings = self.merged_settings(request, slots);
            if signals.is_vendor && !request.preserve_geometry {
                info!("re-exporting vendor geometry");
                let clean = rebuild_clean(&Package::from_parts(parts)?)?;
                (EmbedPath::Rebuilt, clean, settings, slots)
            } else {
                (EmbedPath::Merged, parts, settings, slots)
            }
        };

        let json = settings
            .to_json_pretty()
            .map_err(|e| Error::malformed(PROJECT_SETTINGS_PATH, e.to_string()))?;
        let rewrite = self.rewrite(&working, json, &request.tool_remap);
        working.write_atomic(dest, &rewrite)?;

        info!(?path, tool_slots, keys = settings.len(), "embedded settings");
        Ok(EmbedReport {
            path,
            tool_slots,
            signals,
            settings_keys: settings.len(),
        })
    }

    fn check_tool_count(&self, required: usize) -> Result<()> {
        if required > self.config.max_tools {
            return Err(Error::ToolCountExceeded {
                required,
                available: self.config.max_tools,
            });
        }
        Ok(())
    }

    /// Settings built on top of the package's own settings part
    pub fn preserving_settings(&self, base: Profile, request: &EmbedRequest, slots: usize) -> Profile {
        let mut settings = base;

        for key in ProfileKey::of_kind(|k| k == KeyKind::DeviceGcode) {
            if let Some(value) = self.cache.printer.get(key) {
                settings.set(key, value.clone());
            }
        }
        for key in ProfileKey::of_kind(|k| k == KeyKind::Stripped) {
            settings.remove(key);
        }

        settings.overlay(&self.cache.process);
        settings.overlay(&self.cache.filament);
        settings.overlay(&request.filament_settings);
        settings.overlay(&request.overrides);

        settings.set(ProfileKey::LayerGcode, "G92 E0");
        settings.set_default(ProfileKey::EnableArcFitting, "1");

        clamp_index_fields(&mut settings);
        clamp_tower_position(&mut settings, self.config.bed_size_mm, self.config.tower_margin_mm);
        pad_tool_arrays(&mut settings, slots);

        if as_list(settings.get(ProfileKey::BedTemperatureInitialLayerSingle)).is_empty() {
            let first = as_list(settings.get(ProfileKey::BedTemperatureInitialLayer))
                .into_iter()
                .next()
                .unwrap_or_else(|| Value::from("60"));
            settings.set(ProfileKey::BedTemperatureInitialLayerSingle, vec![first]);
        }
        settings.set(ProfileKey::SingleExtruderMultiMaterial, "0");
        settings
    }

    /// Settings merged from every layer, ignoring the package's own
    pub fn merged_settings(&self, request: &EmbedRequest, slots: usize) -> Profile {
        let mut settings = self.cache.printer.clone();
        settings.overlay(&self.cache.process);
        settings.overlay(&self.cache.filament);
        settings.overlay(&request.filament_settings);
        settings.overlay(&request.overrides);

        settings.set_default(ProfileKey::LayerGcode, "G92 E0");
        settings.set_default(ProfileKey::EnableArcFitting, "1");
        clamp_index_fields(&mut settings);
        pad_tool_arrays(&mut settings, slots);
        debug!(keys = settings.len(), "merged settings");
        settings
    }

    fn rewrite(&self, parts: &PartTable, settings_json: Vec<u8>, remap: &BTreeMap<u32, u32>) -> Rewrite {
        let mut rewrite = Rewrite::new()
            .replace(PROJECT_SETTINGS_PATH, settings_json)
            .drop_part(SLICE_INFO_PATH)
            .drop_part(CUT_INFORMATION_PATH)
            .drop_part(FILAMENT_SEQUENCE_PATH);
        for prefix in PREVIEW_PREFIXES {
            rewrite = rewrite.drop_prefix(prefix);
        }

        if let Some(data) = parts.get(MODEL_SETTINGS_PATH) {
            if let Some(sanitized) = sanitize_model_settings(data, remap, self.config.max_tools) {
                rewrite.set(MODEL_SETTINGS_PATH, sanitized);
            }
        }
        rewrite
    }
}

/// The package's settings part, or an empty profile when it has none
fn existing_settings(parts: &PartTable) -> Result<Profile> {
    let Some(data) = parts.get(PROJECT_SETTINGS_PATH) else {
        return Ok(Profile::new());
    };
    let value: Value = serde_json::from_slice(data)
        .map_err(|e| Error::malformed(PROJECT_SETTINGS_PATH, e.to_string()))?;
    Profile::from_value(value)
        .ok_or_else(|| Error::malformed(PROJECT_SETTINGS_PATH, "settings part is not a JSON object"))
}

/// Clamp integer index fields to their minimum, storing them as strings
///
/// Fractional values are truncated; unreadable ones become the minimum.
pub fn clamp_index_fields(settings: &mut Profile) {
    for key in ProfileKey::ALL {
        let KeyKind::Index { min } = key.kind() else {
            continue;
        };
        let Some(raw) = settings.get(*key) else {
            continue;
        };
        let value = numeric(raw)
            .filter(|v| v.is_finite())
            .map(|v| v.trunc() as i64)
            .unwrap_or(min)
            .max(min);
        settings.set(*key, value.to_string());
    }
}

/// Keep the prime tower far enough from the bed edges
///
/// The reserved half-span is half the tower width plus its brim plus
/// `margin`, never less than 12 mm. List-valued positions stay lists.
pub fn clamp_tower_position(settings: &mut Profile, bed_size: f64, margin: f64) {
    let width = settings
        .get(ProfileKey::PrimeTowerWidth)
        .and_then(numeric)
        .unwrap_or(DEFAULT_TOWER_WIDTH_MM);
    let brim = settings
        .get(ProfileKey::PrimeTowerBrimWidth)
        .and_then(numeric)
        .unwrap_or(DEFAULT_TOWER_BRIM_MM)
        .max(0.0);
    let half_span = (width / 2.0 + brim + margin).max(MIN_TOWER_HALF_SPAN_MM);
    let lo = half_span;
    let hi = lo.max(bed_size - half_span);

    for key in ProfileKey::of_kind(|k| k == KeyKind::TowerPosition) {
        let Some(raw) = settings.get(key) else {
            continue;
        };
        let Some(position) = numeric(raw) else {
            continue;
        };
        let text = format!("{:.3}", position.clamp(lo, hi));
        let value = match raw {
            Value::Array(_) => Value::from(vec![text]),
            _ => Value::from(text),
        };
        settings.set(key, value);
    }
}

/// Pad every per-tool array to `slots` entries by repeating its last value
///
/// Arrays are never shortened; a missing array starts from its default.
pub fn pad_tool_arrays(settings: &mut Profile, slots: usize) {
    for key in ProfileKey::ALL {
        let KeyKind::ToolArray { default } = key.kind() else {
            continue;
        };
        let mut values = as_list(settings.get(*key));
        if values.is_empty() {
            values.push(Value::from(default));
        }
        while values.len() < slots {
            let last = values[values.len() - 1].clone();
            values.push(last);
        }
        settings.set(*key, values);
    }
}

/// Blank stale plate names and apply a tool remap to vendor model settings
///
/// Returns `None` when nothing changed or the part does not parse; the
/// part is then copied as is.
pub fn sanitize_model_settings(
    data: &[u8],
    remap: &BTreeMap<u32, u32>,
    max_tools: usize,
) -> Option<Vec<u8>> {
    let doc = match Document::parse(MODEL_SETTINGS_PATH, data) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "could not sanitize model settings");
            return None;
        }
    };

    let mut changed = 0usize;
    let doc = doc.map_root(|root| {
        root.map_tree(&mut |e| {
            let (element, did) = sanitize_metadata(e, remap, max_tools);
            changed += usize::from(did);
            element
        })
    });
    if changed == 0 {
        return None;
    }

    match doc.to_bytes() {
        Ok(bytes) => {
            info!(changed, "sanitized model settings");
            Some(bytes)
        }
        Err(e) => {
            warn!(error = %e, "could not sanitize model settings");
            None
        }
    }
}

fn sanitize_metadata(e: Element, remap: &BTreeMap<u32, u32>, max_tools: usize) -> (Element, bool) {
    if e.local_name() != "metadata" {
        return (e, false);
    }
    let key = e.attr("key").map(|k| k.into_owned());
    let value = e.attr("value").map(|v| v.into_owned()).unwrap_or_default();

    match key.as_deref() {
        Some("plater_name") if !value.is_empty() => (e.with_attr("value", ""), true),
        Some("extruder") if !remap.is_empty() => {
            let raw = value.trim();
            let Some(from) = raw
                .parse::<u32>()
                .ok()
                .filter(|_| raw.bytes().all(|b| b.is_ascii_digit()))
            else {
                return (e, false);
            };
            match remap.get(&from) {
                Some(&to) if to >= 1 && to as usize <= max_tools && to != from => {
                    (e.with_attr("value", &to.to_string()), true)
                }
                _ => (e, false),
            }
        }
        _ => (e, false),
    }
}
