//! Caller-owned profile cache

use super::keys::Profile;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the device, process and material profiles live
///
/// Relative profile paths are resolved against `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileLocations {
    /// Directory holding the profile tree
    pub root: PathBuf,
    /// Device (printer) profile
    pub printer: PathBuf,
    /// Process profile
    pub process: PathBuf,
    /// Material (filament) profile
    pub filament: PathBuf,
}

impl Default for ProfileLocations {
    fn default() -> Self {
        Self {
            root: PathBuf::from("orca_profiles"),
            printer: PathBuf::from("printer/Snapmaker U1 (0.4 nozzle) - multiplate.json"),
            process: PathBuf::from("process/0.20mm Standard @Snapmaker U1.json"),
            filament: PathBuf::from("filament/PLA @Snapmaker U1.json"),
        }
    }
}

impl ProfileLocations {
    /// Default file names under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Use a different device profile
    pub fn with_printer(mut self, path: impl Into<PathBuf>) -> Self {
        self.printer = path.into();
        self
    }

    /// Use a different process profile
    pub fn with_process(mut self, path: impl Into<PathBuf>) -> Self {
        self.process = path.into();
        self
    }

    /// Use a different material profile
    pub fn with_filament(mut self, path: impl Into<PathBuf>) -> Self {
        self.filament = path.into();
        self
    }

    /// Full path of a profile file
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

/// The three base profiles, loaded once and shared read-only
///
/// Callers decide how long a cache lives; nothing is kept globally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileCache {
    /// Device profile
    pub printer: Profile,
    /// Process profile
    pub process: Profile,
    /// Material profile
    pub filament: Profile,
}

impl ProfileCache {
    /// Read all three profiles
    ///
    /// Fails with [`Error::ProfileNotFound`] for a missing file and
    /// [`Error::MalformedProfile`] for one that is not a JSON object.
    pub fn load(locations: &ProfileLocations) -> Result<Self> {
        let printer = load_profile(&locations.resolve(&locations.printer))?;
        let process = load_profile(&locations.resolve(&locations.process))?;
        let filament = load_profile(&locations.resolve(&locations.filament))?;
        info!(
            printer = printer.len(),
            process = process.len(),
            filament = filament.len(),
            "loaded profiles"
        );
        Ok(Self {
            printer,
            process,
            filament,
        })
    }

    /// Wrap profiles that are already in memory
    pub fn from_profiles(printer: Profile, process: Profile, filament: Profile) -> Self {
        Self {
            printer,
            process,
            filament,
        }
    }
}

/// Read one profile file
pub fn load_profile(path: &Path) -> Result<Profile> {
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::ProfileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let value: serde_json::Value =
        serde_json::from_slice(&data).map_err(|e| Error::MalformedProfile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Profile::from_value(value).ok_or_else(|| Error::MalformedProfile {
        path: path.to_path_buf(),
        message: "profile is not a JSON object".to_string(),
    })
}
