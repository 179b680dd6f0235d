//! Toolpath parsing from files on disk

use platekit::toolpath::{
    MoveKind, ToolpathConfig, extract_layers_from_path, parse_metadata_from_path,
    total_layers_from_path,
};
use platekit::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// A small sliced square tower in the layout slicers emit
fn sliced_tower(layers: usize, with_header: bool) -> String {
    let mut out = String::new();
    out.push_str("; HEADER_BLOCK_START\n");
    if with_header {
        writeln!(out, "; total layer number: {}", layers).unwrap();
    }
    out.push_str("; HEADER_BLOCK_END\nG28\nG90\nM83\nG92 E0\n");

    for layer in 0..layers {
        let z = 0.2 * (layer + 1) as f64;
        writeln!(out, ";LAYER_CHANGE\nG1 Z{:.2} F600", z).unwrap();
        out.push_str("G0 X100 Y100 F9000 ; travel\n");
        out.push_str("G1 X120 Y100 E0.8\nG1 X120 Y120 E0.8\nG1 X100 Y120 E0.8\nG1 X100 Y100 E0.8\n");
        out.push_str("G1 E-0.5\n");
    }

    out.push_str("M104 S0\n; filament used [mm] = 812.33\n; filament used [cm3] = 1.95\n");
    out.push_str("; estimated printing time (normal mode) = 1d 2h 3m 4s\n");
    out
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_metadata_from_file() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "tower.gcode", &sliced_tower(5, true));

    let meta = parse_metadata_from_path(&path, &ToolpathConfig::default()).unwrap();
    assert_eq!(meta.layer_count, 5);
    assert_eq!(meta.estimated_time_seconds, 93_784);
    assert_eq!(meta.filament_used_mm, 812.33);
    assert_eq!((meta.min_x, meta.max_x), (100.0, 120.0));
    assert_eq!((meta.min_y, meta.max_y), (100.0, 120.0));
    assert_eq!(meta.max_z, 1.0);

    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["estimated_time_seconds"], 93_784);
}

#[test]
fn test_layers_from_file() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "tower.gcode", &sliced_tower(5, true));
    let config = ToolpathConfig::default().with_decimation_factor(1);

    let window = extract_layers_from_path(&path, 3, 10, &config).unwrap();
    assert_eq!(window.total_layers, 5);
    assert_eq!(window.start_layer, 3);
    assert_eq!(window.layer_count, 2);

    let layer = &window.layers[0];
    assert_eq!(layer.layer_num, 3);
    assert_eq!(layer.z_height, 0.8);
    // the travel back to the start corner has no XY displacement
    assert_eq!(layer.moves.len(), 4);
    assert!(layer.moves.iter().all(|m| m.kind == MoveKind::Extrude));
    assert_eq!((layer.moves[0].x1, layer.moves[0].x2), (100.0, 120.0));

    let first = extract_layers_from_path(&path, 0, 1, &config).unwrap();
    assert_eq!(first.layers[0].moves[0].kind, MoveKind::Travel);
    assert_eq!(first.layers[0].moves.len(), 5);
}

#[test]
fn test_window_past_the_end() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "tower.gcode", &sliced_tower(3, false));

    let window = extract_layers_from_path(&path, 10, 5, &ToolpathConfig::default()).unwrap();
    assert_eq!(window.total_layers, 3);
    assert!(window.layers.is_empty());
}

#[test]
fn test_total_layers_header_and_fallback() {
    let dir = tempdir().unwrap();
    let config = ToolpathConfig::default();

    let with_header = write(dir.path(), "a.gcode", &sliced_tower(4, true));
    assert_eq!(total_layers_from_path(&with_header, &config).unwrap(), 4);

    let without_header = write(dir.path(), "b.gcode", &sliced_tower(6, false));
    assert_eq!(total_layers_from_path(&without_header, &config).unwrap(), 6);
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let err = parse_metadata_from_path(dir.path().join("none.gcode"), &ToolpathConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
