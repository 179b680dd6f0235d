//! Whole-file toolpath summary

use super::ToolpathConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

const LAYER_COUNT_MARKER: &str = "total layer number";
const TIME_MARKER: &str = "estimated printing time";
const TIME_MODE_MARKER: &str = "normal mode";
const FILAMENT_MARKER: &str = "filament used";
const FILAMENT_UNIT_MARKER: &str = "[mm]";

/// Summary of a toolpath file
///
/// Values the file does not carry are zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolpathMetadata {
    /// Estimated print time in seconds
    pub estimated_time_seconds: u64,
    /// Material length in mm
    pub filament_used_mm: f64,
    /// Layer count announced in the header
    pub layer_count: usize,
    /// Smallest X reached by a motion command
    pub min_x: f64,
    /// Smallest Y reached by a motion command
    pub min_y: f64,
    /// Smallest Z reached by a motion command
    pub min_z: f64,
    /// Largest X reached by a motion command
    pub max_x: f64,
    /// Largest Y reached by a motion command
    pub max_y: f64,
    /// Largest Z reached by a motion command
    pub max_z: f64,
}

/// Running min/max of one axis
#[derive(Debug, Clone, Copy, Default)]
struct Extent(Option<(f64, f64)>);

impl Extent {
    fn add(&mut self, v: f64) {
        self.0 = Some(match self.0 {
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
            None => (v, v),
        });
    }

    fn min(&self) -> f64 {
        self.0.map_or(0.0, |(lo, _)| lo)
    }

    fn max(&self) -> f64 {
        self.0.map_or(0.0, |(_, hi)| hi)
    }
}

/// Read the slicer summary and motion extents in one pass
///
/// The layer count is taken from the first `header_scan_lines` lines, the
/// print time and material length from the last `footer_scan_lines` lines.
/// Extents cover every `G0`/`G1` line.
pub fn parse_metadata<R: BufRead>(mut reader: R, config: &ToolpathConfig) -> Result<ToolpathMetadata> {
    let mut meta = ToolpathMetadata::default();
    let mut footer: VecDeque<String> = VecDeque::with_capacity(config.footer_scan_lines.min(4096));
    let mut extents = [Extent::default(); 3];
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let raw = String::from_utf8_lossy(&buf);
        let line = raw.trim();

        if line_no < config.header_scan_lines && contains_ci(line, LAYER_COUNT_MARKER) {
            if let Some(count) = number_after_colon(line) {
                meta.layer_count = count;
            }
        }
        line_no += 1;

        if line.starts_with("G0 ") || line.starts_with("G1 ") {
            for (axis, extent) in ['X', 'Y', 'Z'].into_iter().zip(extents.iter_mut()) {
                if let Some(v) = loose_axis_value(line, axis) {
                    extent.add(v);
                }
            }
        }

        if config.footer_scan_lines > 0 {
            if footer.len() == config.footer_scan_lines {
                footer.pop_front();
            }
            footer.push_back(line.to_string());
        }
    }

    for line in &footer {
        if contains_ci(line, TIME_MARKER) && contains_ci(line, TIME_MODE_MARKER) {
            if let Some(pos) = line.find('=') {
                meta.estimated_time_seconds = parse_duration(line[pos + 1..].trim());
            }
        } else if contains_ci(line, FILAMENT_MARKER) && contains_ci(line, FILAMENT_UNIT_MARKER) {
            if let Some(mm) = filament_length(line) {
                meta.filament_used_mm = mm;
            }
        }
    }

    let [x, y, z] = extents;
    meta.min_x = x.min();
    meta.min_y = y.min();
    meta.min_z = z.min();
    meta.max_x = x.max();
    meta.max_y = y.max();
    meta.max_z = z.max();

    debug!(
        lines = line_no,
        layers = meta.layer_count,
        seconds = meta.estimated_time_seconds,
        "parsed toolpath metadata"
    );
    Ok(meta)
}

/// [`parse_metadata`] over a file
pub fn parse_metadata_from_path(path: impl AsRef<Path>, config: &ToolpathConfig) -> Result<ToolpathMetadata> {
    parse_metadata(BufReader::new(File::open(path)?), config)
}

/// Convert a slicer duration such as `1d 2h 23m 45s` to seconds
///
/// Each unit is optional; unknown text is ignored.
///
/// ```
/// use platekit::toolpath::parse_duration;
///
/// assert_eq!(parse_duration("1h 23m 45s"), 5025);
/// assert_eq!(parse_duration("23m 45s"), 1425);
/// ```
pub fn parse_duration(text: &str) -> u64 {
    [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)]
        .into_iter()
        .filter_map(|(unit, scale)| digits_before(text, unit).map(|n| n.saturating_mul(scale)))
        .fold(0u64, u64::saturating_add)
}

/// The first run of digits immediately followed by `unit`
fn digits_before(text: &str, unit: char) -> Option<u64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if text[i..].starts_with(unit) {
            return text[start..i].parse().ok();
        }
    }
    None
}

pub(super) fn contains_ci(line: &str, needle: &str) -> bool {
    line.to_ascii_lowercase().contains(needle)
}

/// Digits after the first `:` they directly follow (whitespace allowed)
fn number_after_colon(line: &str) -> Option<usize> {
    line.match_indices(':').find_map(|(pos, _)| {
        let rest = line[pos + 1..].trim_start();
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        rest[..end].parse().ok()
    })
}

/// `= 1234.5` style material length
fn filament_length(line: &str) -> Option<f64> {
    let pos = line.find('=')?;
    let rest = line[pos + 1..].trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Value after the first occurrence of `axis` that is followed by a number,
/// accepting digits, `.` and `-`
fn loose_axis_value(line: &str, axis: char) -> Option<f64> {
    line.match_indices(axis).find_map(|(pos, _)| {
        let rest = &line[pos + axis.len_utf8()..];
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(rest.len());
        rest[..end].parse().ok()
    })
}
