//! Toolpath (G-code) inspection
//!
//! Two read-only passes over slicer output: [`parse_metadata`] collects the
//! summary the slicer writes into header and footer comments plus the motion
//! extents, and [`extract_layers`] replays the motion commands into
//! decimated per-layer line segments for preview rendering.
//!
//! Both take any [`BufRead`](std::io::BufRead) and stream it line by line.

mod layers;
mod metadata;

pub use layers::{
    Layer, LayerWindow, Move, MoveKind, extract_layers, extract_layers_from_path, total_layers,
    total_layers_from_path,
};
pub use metadata::{ToolpathMetadata, parse_duration, parse_metadata, parse_metadata_from_path};

use serde::{Deserialize, Serialize};

/// Tuning for the toolpath parsers
///
/// The defaults match what preview clients expect; none of them are derived
/// from the toolpath itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolpathConfig {
    /// Leading lines searched for the layer count comment
    pub header_scan_lines: usize,
    /// Trailing lines searched for time and material comments
    pub footer_scan_lines: usize,
    /// Keep one of every this many moves per layer
    pub decimation_factor: usize,
    /// Z change in mm that starts a new layer
    pub z_threshold: f64,
}

impl Default for ToolpathConfig {
    fn default() -> Self {
        Self {
            header_scan_lines: 100,
            footer_scan_lines: 1000,
            decimation_factor: 100,
            z_threshold: 0.001,
        }
    }
}

impl ToolpathConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many leading lines are searched
    pub fn with_header_scan_lines(mut self, lines: usize) -> Self {
        self.header_scan_lines = lines;
        self
    }

    /// Set how many trailing lines are searched
    pub fn with_footer_scan_lines(mut self, lines: usize) -> Self {
        self.footer_scan_lines = lines;
        self
    }

    /// Set the decimation factor (0 is treated as 1)
    pub fn with_decimation_factor(mut self, factor: usize) -> Self {
        self.decimation_factor = factor;
        self
    }

    /// Set the layer change threshold
    pub fn with_z_threshold(mut self, threshold: f64) -> Self {
        self.z_threshold = threshold;
        self
    }
}

/// Axis words found on a command line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct AxisWords {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub e: Option<f64>,
}

impl AxisWords {
    /// Scan `X`, `Y`, `Z` and `E` words anywhere on the line
    ///
    /// A word is the letter followed by an optionally signed decimal number.
    /// When a letter repeats, the last occurrence wins.
    pub(crate) fn scan(line: &str) -> Self {
        let bytes = line.as_bytes();
        let mut words = Self::default();
        let mut i = 0;
        while i < bytes.len() {
            let slot = match bytes[i] {
                b'X' => &mut words.x,
                b'Y' => &mut words.y,
                b'Z' => &mut words.z,
                b'E' => &mut words.e,
                _ => {
                    i += 1;
                    continue;
                }
            };
            match number_at(line, i + 1) {
                Some((value, end)) => {
                    *slot = Some(value);
                    i = end;
                }
                None => i += 1,
            }
        }
        words
    }
}

/// Parse `[-+]?\d*\.?\d+` starting at `start`, returning the value and end offset
fn number_at(line: &str, start: usize) -> Option<(f64, usize)> {
    let bytes = line.as_bytes();
    let mut end = start;
    if matches!(bytes.get(end), Some(b'-' | b'+')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let has_int = end > int_start;
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    } else if !has_int {
        return None;
    }
    line[start..end].parse().ok().map(|v| (v, end))
}

/// Strip an inline `;` comment and surrounding whitespace
pub(crate) fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => line[..pos].trim(),
        None => line.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_words() {
        let words = AxisWords::scan("G1 X10.5 Y-3 Z.2 E+0.75 F1800");
        assert_eq!(words.x, Some(10.5));
        assert_eq!(words.y, Some(-3.0));
        assert_eq!(words.z, Some(0.2));
        assert_eq!(words.e, Some(0.75));
    }

    #[test]
    fn test_scan_packed_and_repeated() {
        let words = AxisWords::scan("G1X1Y2X3");
        assert_eq!(words.x, Some(3.0));
        assert_eq!(words.y, Some(2.0));
        assert_eq!(words.z, None);
    }

    #[test]
    fn test_scan_rejects_bare_letters() {
        let words = AxisWords::scan("G92 E X- Y.");
        assert_eq!(words, AxisWords::default());
    }

    #[test]
    fn test_trailing_dot_stops_number() {
        assert_eq!(number_at("X10.", 1), Some((10.0, 3)));
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("  G1 X1 ; move\n"), "G1 X1");
        assert_eq!(strip_comment("; only comment"), "");
    }

    #[test]
    fn test_config_builders() {
        let config = ToolpathConfig::new().with_decimation_factor(10).with_z_threshold(0.01);
        assert_eq!(config.decimation_factor, 10);
        assert_eq!(config.header_scan_lines, 100);
        let partial: ToolpathConfig = serde_json::from_str(r#"{"footer_scan_lines": 50}"#).unwrap();
        assert_eq!(partial.footer_scan_lines, 50);
        assert_eq!(partial.decimation_factor, 100);
    }
}
