//! Package reading into an ordered part table

use super::{MODEL_PATH, RELS_PATH, normalize_path, relationships};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipArchive;

/// A single named part of the package
#[derive(Debug, Clone)]
pub struct Part {
    /// Part name as stored in the archive (no leading slash)
    pub name: String,
    /// Uncompressed part content
    pub data: Vec<u8>,
    /// Compression method used by the source archive
    pub compression: CompressionMethod,
    /// Whether the entry is a directory marker
    pub is_dir: bool,
}

/// Ordered in-memory view of every part in a package
///
/// Part order and per-part compression are kept so that a rewrite reproduces
/// the source archive apart from the parts an operation targets.
#[derive(Debug, Clone, Default)]
pub struct PartTable {
    parts: Vec<Part>,
}

impl PartTable {
    /// Open a package from any seekable reader
    pub fn open<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push(Part {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        debug!(parts = parts.len(), "opened package");
        Ok(Self { parts })
    }

    /// Open a package from a file on disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::open(BufReader::new(file))
    }

    /// Open a package held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::open(Cursor::new(bytes))
    }

    /// Build a table directly from parts, in the given order
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    /// Iterate over part names in archive order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Iterate over the parts in archive order
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter()
    }

    /// Number of parts, including directory entries
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the package has no parts
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Check if a part exists
    ///
    /// A leading slash on `name` is ignored, matching OPC part-name usage
    /// in relationship targets and `p:path` attributes.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get a part's content if it exists
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        let name = normalize_path(name);
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    /// Get a part's content
    pub fn read(&self, name: &str) -> Result<&[u8]> {
        self.get(name)
            .ok_or_else(|| Error::PartNotFound(name.to_string()))
    }

    /// Get a part's content as UTF-8 text
    pub fn read_str(&self, name: &str) -> Result<&str> {
        let data = self.read(name)?;
        std::str::from_utf8(data).map_err(|e| Error::malformed(name, e.to_string()))
    }

    /// Locate the geometry part
    ///
    /// The target of the 3D model relationship in `_rels/.rels` wins; when
    /// the relationships part is missing or unreadable the conventional
    /// `3D/3dmodel.model` path is used.
    pub fn model_path(&self) -> String {
        self.get(RELS_PATH)
            .and_then(relationships::find_model_target)
            .unwrap_or_else(|| MODEL_PATH.to_string())
    }
}
