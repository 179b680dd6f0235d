//! Shared fixtures for integration tests
//!
//! Packages are assembled in memory with `zip::ZipWriter` so every test
//! controls exactly which parts exist.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
    <Default Extension="config" ContentType="text/xml"/>
</Types>"#;

pub const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rel0" Target="/3D/3dmodel.model" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

pub const MODEL_PATH: &str = "3D/3dmodel.model";

/// Axis-aligned box mesh spanning `0..size` on every axis
pub fn cube_mesh(size: f64) -> String {
    let mut xml = String::from("<mesh><vertices>");
    for i in 0..8 {
        let x = if i & 1 != 0 { size } else { 0.0 };
        let y = if i & 2 != 0 { size } else { 0.0 };
        let z = if i & 4 != 0 { size } else { 0.0 };
        xml.push_str(&format!(r#"<vertex x="{}" y="{}" z="{}"/>"#, x, y, z));
    }
    xml.push_str("</vertices><triangles>");
    for (a, b, c) in [
        (0, 1, 3),
        (0, 3, 2),
        (4, 6, 7),
        (4, 7, 5),
        (0, 4, 5),
        (0, 5, 1),
        (2, 3, 7),
        (2, 7, 6),
        (0, 2, 6),
        (0, 6, 4),
        (1, 5, 7),
        (1, 7, 3),
    ] {
        xml.push_str(&format!(r#"<triangle v1="{}" v2="{}" v3="{}"/>"#, a, b, c));
    }
    xml.push_str("</triangles></mesh>");
    xml
}

/// A geometry part with the given resources and build children
pub fn model_xml(resources: &str, build: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xml:lang="en-US" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02" xmlns:p="http://schemas.microsoft.com/3dmanufacturing/production/2015/06">
  <resources>
    {}
  </resources>
  <build>
    {}
  </build>
</model>"#,
        resources, build
    )
}

/// Zip bytes holding the OPC boilerplate plus `parts`
pub fn package_bytes(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(RELS.as_bytes()).unwrap();

    for (name, data) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Write a package into `dir` and return its path
pub fn write_package(dir: &Path, file_name: &str, parts: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, package_bytes(parts)).unwrap();
    path
}

/// Single 20 mm cube placed once at the bed center
pub fn single_cube_package(dir: &Path) -> PathBuf {
    let resources = format!(r#"<object id="1" name="Cube" type="model">{}</object>"#, cube_mesh(20.0));
    let build = r#"<item objectid="1" transform="1 0 0 0 1 0 0 0 1 125 125 0"/>"#;
    write_package(dir, "cube.3mf", &[(MODEL_PATH, &model_xml(&resources, build))])
}

/// Vendor-style layout: a container object pointing into a sub-file
pub fn vendor_object_parts(sub_name: &str) -> (String, String) {
    let main = model_xml(
        &format!(
            r#"<object id="2" type="model"><components><component p:path="/3D/Objects/{}.model" objectid="1" transform="1 0 0 0 1 0 0 0 1 0 0 0"/></components></object>"#,
            sub_name
        ),
        r#"<item objectid="2" transform="1 0 0 0 1 0 0 0 1 100 100 0" printable="1"/>"#,
    );
    let sub = model_xml(
        &format!(r#"<object id="1" type="model">{}</object>"#, cube_mesh(10.0)),
        "",
    );
    (main, sub)
}

/// Read one part of a written package as a string
pub fn read_part(path: &Path, name: &str) -> String {
    let parts = platekit::PartTable::from_path(path).unwrap();
    String::from_utf8(parts.read(name).unwrap().to_vec()).unwrap()
}
