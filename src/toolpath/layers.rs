//! Per-layer move extraction

use super::metadata::contains_ci;
use super::{AxisWords, ToolpathConfig, strip_comment};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

/// Minimum XY displacement, in mm, for a move to be kept
const MIN_XY_TRAVEL: f64 = 0.001;

/// Whether material was laid down along a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    /// Non-printing repositioning
    Travel,
    /// Printing move
    Extrude,
}

/// One XY segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Travel or extrusion
    #[serde(rename = "type")]
    pub kind: MoveKind,
    /// Start X
    pub x1: f64,
    /// Start Y
    pub y1: f64,
    /// End X
    pub x2: f64,
    /// End Y
    pub y2: f64,
}

/// Decimated moves at one height
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Zero-based layer index
    pub layer_num: usize,
    /// Height in mm, rounded to three decimals
    pub z_height: f64,
    /// Kept moves in file order
    pub moves: Vec<Move>,
}

/// A requested range of layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWindow {
    /// Number of layers in the whole file
    pub total_layers: usize,
    /// First requested index
    pub start_layer: usize,
    /// Number of layers returned
    pub layer_count: usize,
    /// Layers in index order
    pub layers: Vec<Layer>,
}

impl LayerWindow {
    /// Number of layers returned
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    AbsolutePositioning,
    RelativePositioning,
    AbsoluteExtrusion,
    RelativeExtrusion,
    SetPosition,
    Move,
    Other,
}

impl Command {
    fn classify(line: &str) -> Self {
        if line.starts_with("G90") {
            Self::AbsolutePositioning
        } else if line.starts_with("G91") {
            Self::RelativePositioning
        } else if line.starts_with("M82") {
            Self::AbsoluteExtrusion
        } else if line.starts_with("M83") {
            Self::RelativeExtrusion
        } else if line.starts_with("G92") {
            Self::SetPosition
        } else if is_linear_move(line) {
            Self::Move
        } else {
            Self::Other
        }
    }
}

/// `G0` or `G1` followed by whitespace
fn is_linear_move(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() > 2
        && bytes[0] == b'G'
        && matches!(bytes[1], b'0' | b'1')
        && bytes[2].is_ascii_whitespace()
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Motion replay state
struct Replay<'a> {
    config: &'a ToolpathConfig,
    window: std::ops::Range<usize>,
    x: f64,
    y: f64,
    z: f64,
    e: f64,
    absolute_positioning: bool,
    absolute_extrusion: bool,
    current_layer: usize,
    current_z: f64,
    /// Every layer seen so far; moves are only kept inside `window`
    layers: Vec<Layer>,
    /// Qualifying moves seen per layer
    counters: Vec<usize>,
}

impl<'a> Replay<'a> {
    fn new(config: &'a ToolpathConfig, window: std::ops::Range<usize>) -> Self {
        Self {
            config,
            window,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            e: 0.0,
            absolute_positioning: true,
            absolute_extrusion: false,
            current_layer: 0,
            current_z: 0.0,
            layers: Vec::new(),
            counters: Vec::new(),
        }
    }

    fn feed(&mut self, line: &str) {
        let line = strip_comment(line);
        if line.is_empty() {
            return;
        }
        match Command::classify(line) {
            Command::AbsolutePositioning => self.absolute_positioning = true,
            Command::RelativePositioning => self.absolute_positioning = false,
            Command::AbsoluteExtrusion => self.absolute_extrusion = true,
            Command::RelativeExtrusion => self.absolute_extrusion = false,
            Command::SetPosition => self.set_position(AxisWords::scan(line)),
            Command::Move => self.linear_move(AxisWords::scan(line)),
            Command::Other => {}
        }
    }

    fn set_position(&mut self, words: AxisWords) {
        self.x = words.x.unwrap_or(self.x);
        self.y = words.y.unwrap_or(self.y);
        self.z = words.z.unwrap_or(self.z);
        self.e = words.e.unwrap_or(self.e);
    }

    fn linear_move(&mut self, words: AxisWords) {
        let (prev_x, prev_y, prev_e) = (self.x, self.y, self.e);
        let positioning = self.absolute_positioning;
        let step = |current: f64, word: Option<f64>, absolute: bool| match word {
            Some(v) if absolute => v,
            Some(v) => current + v,
            None => current,
        };

        self.x = step(self.x, words.x, positioning);
        self.y = step(self.y, words.y, positioning);
        if words.z.is_some() {
            self.z = step(self.z, words.z, positioning);
            if (self.z - self.current_z).abs() > self.config.z_threshold {
                self.current_z = self.z;
                self.current_layer = self.layers.iter().filter(|l| l.z_height <= self.z).count();
            }
        }
        self.e = step(self.e, words.e, self.absolute_extrusion);

        if (self.x - prev_x).abs() < MIN_XY_TRAVEL && (self.y - prev_y).abs() < MIN_XY_TRAVEL {
            return;
        }

        // The index never exceeds the number of layers seen
        if self.current_layer == self.layers.len() {
            self.layers.push(Layer {
                layer_num: self.current_layer,
                z_height: round_to(self.current_z, 3),
                moves: Vec::new(),
            });
            self.counters.push(0);
        }

        let counter = &mut self.counters[self.current_layer];
        *counter += 1;
        let factor = self.config.decimation_factor.max(1);
        if *counter != 1 && *counter % factor != 0 {
            return;
        }
        if !self.window.contains(&self.current_layer) {
            return;
        }

        let kind = if self.e > prev_e {
            MoveKind::Extrude
        } else {
            MoveKind::Travel
        };
        self.layers[self.current_layer].moves.push(Move {
            kind,
            x1: round_to(prev_x, 2),
            y1: round_to(prev_y, 2),
            x2: round_to(self.x, 2),
            y2: round_to(self.y, 2),
        });
    }

    fn finish(self) -> LayerWindow {
        let total_layers = self.layers.len();
        let start_layer = self.window.start;
        let end = self.window.end.min(total_layers);
        let layers: Vec<Layer> = self
            .layers
            .into_iter()
            .skip(start_layer)
            .take(end.saturating_sub(start_layer))
            .collect();
        LayerWindow {
            total_layers,
            start_layer,
            layer_count: layers.len(),
            layers,
        }
    }
}

fn replay<R: BufRead>(mut reader: R, replay: &mut Replay<'_>) -> Result<usize> {
    let mut buf = Vec::new();
    let mut lines = 0usize;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        replay.feed(&String::from_utf8_lossy(&buf));
        lines += 1;
    }
    Ok(lines)
}

/// Replay the toolpath and return layers `start..start + count`
///
/// The whole file is always read so `total_layers` is exact. Layers past
/// the end of the file are simply absent from the window.
pub fn extract_layers<R: BufRead>(
    reader: R,
    start: usize,
    count: usize,
    config: &ToolpathConfig,
) -> Result<LayerWindow> {
    let mut state = Replay::new(config, start..start.saturating_add(count));
    let lines = replay(reader, &mut state)?;
    let window = state.finish();
    info!(
        lines,
        total = window.total_layers,
        start,
        returned = window.layer_count,
        "extracted toolpath layers"
    );
    Ok(window)
}

/// [`extract_layers`] over a file
pub fn extract_layers_from_path(
    path: impl AsRef<Path>,
    start: usize,
    count: usize,
    config: &ToolpathConfig,
) -> Result<LayerWindow> {
    extract_layers(BufReader::new(File::open(path)?), start, count, config)
}

/// Layer count from the header comment, or by full replay when absent
pub fn total_layers<R: BufRead + Seek>(mut reader: R, config: &ToolpathConfig) -> Result<usize> {
    let mut buf = Vec::new();
    for _ in 0..config.header_scan_lines {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if !contains_ci(&line, "total layer number") {
            continue;
        }
        if let Some(count) = first_digit_run(&line) {
            debug!(count, "layer count from header");
            return Ok(count);
        }
    }

    warn!("layer count not found in header, replaying whole toolpath");
    reader.seek(SeekFrom::Start(0))?;
    let mut state = Replay::new(config, 0..0);
    replay(reader, &mut state)?;
    Ok(state.layers.len())
}

/// [`total_layers`] over a file
pub fn total_layers_from_path(path: impl AsRef<Path>, config: &ToolpathConfig) -> Result<usize> {
    total_layers(BufReader::new(File::open(path)?), config)
}

fn first_digit_run(line: &str) -> Option<usize> {
    let start = line.find(|c: char| c.is_ascii_digit())?;
    let rest = &line[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().ok()
}
