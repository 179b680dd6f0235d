//! Error types for package, profile and toolpath operations
//!
//! All errors carry an error code for categorization, mirroring the layout
//! used throughout the crate's messages.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O and archive errors
//! - **E2xxx**: Part content errors (XML / JSON)
//! - **E3xxx**: Model and parameter errors
//! - **E4xxx**: Profile errors
//!
//! ## Common Error Codes
//!
//! - `E1001`: I/O error reading or writing a file
//! - `E1002`: Corrupt or unreadable ZIP archive
//! - `E1003`: Missing required package part
//! - `E1004`: Requested part not present
//! - `E2001`: Malformed XML or JSON part
//! - `E2005`: XML writing error
//! - `E3001`: Empty or invalid build list
//! - `E3002`: Invalid caller parameter
//! - `E3003`: Reference to an unknown object
//! - `E3004`: Numeric parse error
//! - `E4001`: Profile file not found
//! - `E4002`: Malformed profile
//! - `E4003`: Tool count exceeds hardware

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for platekit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, rewriting or inspecting print artifacts
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred while reading or writing a file
    ///
    /// **Error Code**: E1001
    ///
    /// **Common Causes**:
    /// - File not found
    /// - Insufficient permissions
    /// - Destination directory missing
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive could not be read as a ZIP container
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - Truncated upload
    /// - File is not a 3MF (ZIP) archive
    /// - Unsupported compression method
    ///
    /// **Suggestions**:
    /// - Re-export the model from the authoring tool
    #[error("[E1002] Corrupt archive: {0}")]
    CorruptArchive(#[from] zip::result::ZipError),

    /// A part every package must carry is absent
    ///
    /// **Error Code**: E1003
    ///
    /// **Common Causes**:
    /// - Incomplete package
    /// - Missing `[Content_Types].xml`, `_rels/.rels` or the geometry part
    #[error("[E1003] Missing required part: {0}")]
    MissingRequiredPart(String),

    /// A specific part was requested but is not in the package
    ///
    /// **Error Code**: E1004
    #[error("[E1004] Part not found: {0}")]
    PartNotFound(String),

    /// A targeted XML or JSON part failed to parse
    ///
    /// **Error Code**: E2001
    ///
    /// **Common Causes**:
    /// - Malformed XML syntax
    /// - Settings part is not a JSON object
    /// - Invalid character encoding
    #[error("[E2001] Malformed part '{part}': {message}")]
    MalformedPart {
        /// Name of the offending part
        part: String,
        /// Parser diagnostic
        message: String,
    },

    /// XML writing error
    ///
    /// **Error Code**: E2005
    ///
    /// **Common Causes**:
    /// - Failed to serialize XML
    /// - I/O error during writing
    #[error("[E2005] XML writing error: {0}")]
    XmlWrite(String),

    /// The build list is empty or unusable for the requested operation
    ///
    /// **Error Code**: E3001
    ///
    /// **Suggestions**:
    /// - Ensure the package places at least one printable item
    #[error("[E3001] Empty or invalid build list: {0}")]
    EmptyOrInvalidBuildList(String),

    /// A caller-supplied parameter is out of range
    ///
    /// **Error Code**: E3002
    ///
    /// **Common Causes**:
    /// - Copy count below 1
    /// - Non-positive scale percentage
    /// - Plate number outside the build list
    #[error("[E3002] Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A build item or request names an object that does not exist
    ///
    /// **Error Code**: E3003
    #[error("[E3003] Unknown object reference: object {object_id} is not defined")]
    UnknownObjectRef {
        /// The referenced object id
        object_id: usize,
    },

    /// Parse error for numeric values
    ///
    /// **Error Code**: E3004
    ///
    /// **Common Causes**:
    /// - Invalid number format
    /// - Non-numeric characters in numeric attributes
    ///
    /// **Suggestions**:
    /// - Verify numeric values use proper format (e.g., "1.5" not "1,5")
    #[error("[E3004] Parse error: {0}")]
    ParseError(String),

    /// A profile file could not be found
    ///
    /// **Error Code**: E4001
    #[error("[E4001] Profile not found: {}", .0.display())]
    ProfileNotFound(PathBuf),

    /// A profile file is not a JSON object
    ///
    /// **Error Code**: E4002
    #[error("[E4002] Malformed profile '{}': {message}", .path.display())]
    MalformedProfile {
        /// Path of the offending profile
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// More tool slots are required than the target hardware offers
    ///
    /// **Error Code**: E4003
    ///
    /// **Suggestions**:
    /// - Reduce the number of filaments or merge tool assignments
    #[error("[E4003] Tool count exceeded: {required} tool slots required, hardware supports {available}")]
    ToolCountExceeded {
        /// Slots the job needs
        required: usize,
        /// Slots the hardware provides
        available: usize,
    },
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::ParseError(format!("Failed to parse floating-point number: {}", err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::ParseError(format!("Failed to parse integer: {}", err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::ParseError(format!("Invalid XML attribute: {}", err))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl Error {
    /// Create a MalformedPart error for the named part
    ///
    /// # Example
    /// ```ignore
    /// Error::malformed("3D/3dmodel.model", "unexpected end of input")
    /// ```
    pub fn malformed(part: &str, message: impl Into<String>) -> Self {
        Error::MalformedPart {
            part: part.to_string(),
            message: message.into(),
        }
    }

    /// Create an XmlWrite error
    pub fn xml_write(message: String) -> Self {
        Error::XmlWrite(message)
    }

    /// Create a ParseError with context about what was being parsed
    ///
    /// # Arguments
    /// * `field_name` - The name of the field being parsed (e.g., "vertex x coordinate")
    /// * `value` - The value that failed to parse
    /// * `expected_type` - The expected type (e.g., "floating-point number")
    pub fn parse_error_with_context(field_name: &str, value: &str, expected_type: &str) -> Self {
        Error::ParseError(format!(
            "Failed to parse '{}': expected {}, got '{}'",
            field_name, expected_type, value
        ))
    }
}

/// Recoverable conditions reported next to a successful result
///
/// Auxiliary vendor parts are read best-effort; anything skipped along the
/// way is surfaced here rather than failing the whole operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A build item references an object that is not defined
    UnknownObjectRef {
        /// 1-based position of the item in the build list
        plate_id: usize,
        /// The missing object id
        object_id: usize,
    },
    /// A transform had an unsupported number of values and identity was used
    InvalidTransform {
        /// 1-based position of the item in the build list
        plate_id: usize,
        /// Number of values found
        len: usize,
    },
    /// A component's sub-file could not be read or parsed
    UnreadableSubModel {
        /// Part name of the sub-file
        path: String,
    },
    /// Free-form note produced by validation
    Note(String),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnknownObjectRef {
                plate_id,
                object_id,
            } => write!(
                f,
                "Plate {} references unknown object {}",
                plate_id, object_id
            ),
            Warning::InvalidTransform { plate_id, len } => write!(
                f,
                "Plate {} has a transform with {} values; identity used",
                plate_id, len
            ),
            Warning::UnreadableSubModel { path } => {
                write!(f, "Sub-model '{}' could not be read", path)
            }
            Warning::Note(message) => f.write_str(message),
        }
    }
}
