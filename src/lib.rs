//! # platekit
//!
//! Print-job preparation for 3MF packages and the toolpaths sliced from them.
//!
//! A 3MF file is a ZIP container following the Open Packaging Conventions
//! (OPC) with an XML geometry part and, when it comes from a desktop slicer,
//! a set of vendor settings parts. This library reads such packages, works
//! out which objects and plates they hold, and writes rewritten copies.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - Part-level container access that preserves every untouched part byte for byte
//! - Object resolution across sub-model files, with multi-plate detection
//! - Axis-aligned bounds in build space
//! - Grid duplication and uniform scaling of placements
//! - Slicer profile merging and embedding, keeping vendor tool assignments
//! - Toolpath (G-code) metadata and decimated per-layer preview extraction
//!
//! Every mutating operation reads a source package and writes a new one;
//! sources are never modified.
//!
//! ## Example
//!
//! ```no_run
//! use platekit::{BoundsScope, Package, bounds};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let package = Package::open("upload.3mf")?;
//! let report = bounds(&package, BoundsScope::Whole)?;
//!
//! if let Some(aabb) = report.aabb {
//!     println!("size {:?}, {} items skipped", aabb.size(), report.warnings.len());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bounds;
pub mod config;
pub mod error;
pub mod layout;
pub mod model;
pub mod opc;
pub mod package;
pub mod parser;
pub mod plates;
pub mod profile;
pub mod resolver;
pub mod toolpath;
pub mod transform;
pub mod vendor;
pub mod writer;
pub mod xml;

pub use bounds::{Aabb, BoundsReport, BoundsScope, bounds, object_bounds, object_dimensions};
pub use config::{BedSize, PrinterProfile};
pub use error::{Error, Result, Warning};
pub use layout::{DuplicateReport, DuplicateRequest, ScaleMode, duplicate, scale};
pub use model::{
    Build, BuildItem, Component, Mesh, MetadataEntry, Model, Object, ObjectType, Resources,
    Triangle, Vertex,
};
pub use opc::{PartTable, Rewrite};
pub use package::Package;
pub use plates::{PlateValidation, extract_plate, validate_plate};
pub use resolver::{
    ObjectInfo, ObjectSource, PlateInfo, PlateLayout, Provenance, detect_plates, resolve_objects,
};
pub use transform::Transform;
pub use vendor::VendorSignals;
