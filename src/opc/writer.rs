//! Package writing: copy-then-override rewrites and fresh packages

use super::content_types::DEFAULT_CONTENT_TYPES;
use super::relationships::DEFAULT_RELS;
use super::{
    CONTENT_TYPES_PATH, MODEL_PATH, PartTable, RELS_PATH, normalize_path, validate_opc_part_name,
    validate_package,
};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// The set of part substitutions applied while copying a package
///
/// Every source part is copied unless it is dropped or overridden.
/// Overridden parts keep their position in the archive; overrides naming a
/// part the source does not have are appended at the end, in the order they
/// were added. An override wins over a drop of the same name.
#[derive(Debug, Clone, Default)]
pub struct Rewrite {
    overrides: Vec<(String, Vec<u8>)>,
    dropped: HashSet<String>,
    dropped_prefixes: Vec<String>,
}

impl Rewrite {
    /// Create an empty rewrite (a plain copy)
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitute or add a part
    pub fn replace(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.set(name, data);
        self
    }

    /// Substitute or add a part in place
    pub fn set(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = normalize_path(&name.into()).to_string();
        match self.overrides.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = data,
            None => self.overrides.push((name, data)),
        }
    }

    /// Omit a part from the output
    pub fn drop_part(mut self, name: impl Into<String>) -> Self {
        self.dropped
            .insert(normalize_path(&name.into()).to_string());
        self
    }

    /// Omit every part whose name starts with `prefix`
    pub fn drop_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dropped_prefixes.push(prefix.into());
        self
    }

    /// Check if the rewrite changes nothing
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.dropped.is_empty() && self.dropped_prefixes.is_empty()
    }

    fn override_for(&self, name: &str) -> Option<&[u8]> {
        self.overrides
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    fn is_dropped(&self, name: &str) -> bool {
        self.dropped.contains(name) || self.dropped_prefixes.iter().any(|p| name.starts_with(p))
    }
}

impl PartTable {
    /// Write this package with `rewrite` applied to any seekable writer
    pub fn write_to<W: Write + Seek>(&self, writer: W, rewrite: &Rewrite) -> Result<W> {
        for (name, _) in &rewrite.overrides {
            validate_opc_part_name(name)?;
        }

        let mut zip = ZipWriter::new(writer);
        let mut written = HashSet::new();

        for part in self.parts() {
            let replacement = rewrite.override_for(&part.name);
            if replacement.is_none() && rewrite.is_dropped(&part.name) {
                debug!(part = %part.name, "dropping part");
                continue;
            }

            let options = SimpleFileOptions::default().compression_method(normalize_method(
                part.compression,
            ));
            if part.is_dir {
                zip.add_directory(part.name.as_str(), options)
                    .map_err(|e| Error::xml_write(format!("Failed to add directory {}: {}", part.name, e)))?;
                continue;
            }

            let data = replacement.unwrap_or(&part.data);
            write_entry(&mut zip, &part.name, data, options)?;
            written.insert(part.name.as_str());
        }

        for (name, data) in &rewrite.overrides {
            if written.contains(name.as_str()) {
                continue;
            }
            debug!(part = %name, "appending part");
            write_entry(&mut zip, name, data, SimpleFileOptions::default())?;
        }

        zip.finish()
            .map_err(|e| Error::xml_write(format!("Failed to finalize ZIP archive: {}", e)))
    }

    /// Produce the rewritten package in memory
    pub fn to_bytes(&self, rewrite: &Rewrite) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()), rewrite)?.into_inner())
    }

    /// Write the rewritten package to `dest`
    ///
    /// The archive is built in memory, reopened and validated, written to a
    /// temporary file beside `dest` and only then renamed over it. On any
    /// failure the destination is left untouched.
    pub fn write_atomic(&self, dest: &Path, rewrite: &Rewrite) -> Result<()> {
        let bytes = self.to_bytes(rewrite)?;
        let written = PartTable::from_bytes(&bytes)?;
        validate_package(&written)?;
        persist_bytes(dest, &bytes)?;
        info!(dest = %dest.display(), parts = written.len(), "wrote package");
        Ok(())
    }
}

/// Copy a package byte-for-byte to `dest` through a temporary file
pub fn copy_package(source: &Path, dest: &Path) -> Result<()> {
    let bytes = std::fs::read(source)?;
    PartTable::from_bytes(&bytes)?;
    persist_bytes(dest, &bytes)?;
    debug!(source = %source.display(), dest = %dest.display(), "copied package unchanged");
    Ok(())
}

/// Create a fresh 3MF package from a geometry part
///
/// Writes `[Content_Types].xml`, `_rels/.rels` and `3D/3dmodel.model`.
pub fn create_package<W: Write + Seek>(writer: W, model_xml: &[u8]) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    write_entry(&mut zip, CONTENT_TYPES_PATH, DEFAULT_CONTENT_TYPES.as_bytes(), options)?;
    write_entry(&mut zip, RELS_PATH, DEFAULT_RELS.as_bytes(), options)?;
    write_entry(&mut zip, MODEL_PATH, model_xml, options)?;

    zip.finish()
        .map_err(|e| Error::xml_write(format!("Failed to finalize ZIP archive: {}", e)))
}

fn write_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    data: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|e| Error::xml_write(format!("Failed to create {}: {}", name, e)))?;
    zip.write_all(data)
        .map_err(|e| Error::xml_write(format!("Failed to write {}: {}", name, e)))?;
    Ok(())
}

/// Only stored and deflated entries can be written back
fn normalize_method(method: CompressionMethod) -> CompressionMethod {
    match method {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}

fn persist_bytes(dest: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".platekit-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_package_is_valid() {
        let model = br#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02"><resources/><build/></model>"#;
        let bytes = create_package(Cursor::new(Vec::new()), model)
            .unwrap()
            .into_inner();
        let table = PartTable::from_bytes(&bytes).unwrap();
        assert!(validate_package(&table).is_ok());
        assert_eq!(table.read(MODEL_PATH).unwrap(), model.as_slice());
    }

    #[test]
    fn test_write_atomic_leaves_no_destination_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.3mf");

        // No geometry part: post-write validation must fail
        let table = PartTable::default();
        let rewrite = Rewrite::new().replace(CONTENT_TYPES_PATH, b"<Types/>".to_vec());
        assert!(table.write_atomic(&dest, &rewrite).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn test_drop_prefix() {
        let rewrite = Rewrite::new().drop_prefix("Metadata/plate");
        assert!(rewrite.is_dropped("Metadata/plate_1.png"));
        assert!(!rewrite.is_dropped("Metadata/model_settings.config"));
    }

    #[test]
    fn test_rejects_invalid_override_name() {
        let table = PartTable::default();
        let rewrite = Rewrite::new().replace("Metadata/../evil", Vec::new());
        assert!(matches!(
            table.to_bytes(&rewrite),
            Err(Error::InvalidParameter(_))
        ));
    }
}
