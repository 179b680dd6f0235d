//! OPC (Open Packaging Conventions) container handling
//!
//! 3MF files are ZIP archives following the OPC standard. This module reads
//! an archive into an ordered, in-memory part table and writes new archives
//! by copying every part and substituting only the parts an operation
//! targets. Writes are validated and then atomically moved into place.

mod content_types;
mod reader;
mod relationships;
mod validation;
mod writer;

pub use reader::{Part, PartTable};
pub use validation::validate_package;
pub use writer::{Rewrite, copy_package, create_package};

pub(crate) use validation::{normalize_path, validate_opc_part_name};

/// Main 3D model file path within the 3MF archive
pub const MODEL_PATH: &str = "3D/3dmodel.model";

/// Content types file path
pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

/// Relationships file path
pub const RELS_PATH: &str = "_rels/.rels";

/// 3D model relationship type
pub const MODEL_REL_TYPE: &str = "http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel";

/// 3MF core namespace carried by the geometry part's root element
pub const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// 3MF production extension namespace (component `p:path` references)
pub const PRODUCTION_NAMESPACE: &str =
    "http://schemas.microsoft.com/3dmanufacturing/production/2015/06";
