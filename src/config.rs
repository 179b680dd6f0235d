//! Printer and bed configuration
//!
//! All configuration is passed explicitly by the caller; nothing is read
//! from the environment. Defaults describe the Snapmaker U1.

use serde::{Deserialize, Serialize};

/// Printable bed rectangle used for layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BedSize {
    /// X extent in mm
    pub width: f64,
    /// Y extent in mm
    pub depth: f64,
}

impl Default for BedSize {
    fn default() -> Self {
        Self {
            width: 270.0,
            depth: 270.0,
        }
    }
}

impl BedSize {
    /// Create a bed of the given size
    pub fn new(width: f64, depth: f64) -> Self {
        Self { width, depth }
    }

    /// Set the X extent
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    /// Set the Y extent
    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    /// Center of the bed
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.depth / 2.0)
    }
}

/// Build volume of a printer, used to validate plates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterProfile {
    /// Display name
    pub name: String,
    /// X limit in mm
    pub build_volume_x: f64,
    /// Y limit in mm
    pub build_volume_y: f64,
    /// Z limit in mm
    pub build_volume_z: f64,
}

impl Default for PrinterProfile {
    fn default() -> Self {
        Self {
            name: "Snapmaker U1".to_string(),
            build_volume_x: 300.0,
            build_volume_y: 250.0,
            build_volume_z: 235.0,
        }
    }
}

impl PrinterProfile {
    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the build volume
    pub fn with_build_volume(mut self, x: f64, y: f64, z: f64) -> Self {
        self.build_volume_x = x;
        self.build_volume_y = y;
        self.build_volume_z = z;
        self
    }
}
