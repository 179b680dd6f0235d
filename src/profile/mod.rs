//! Slicer settings embedding
//!
//! Device, process and material profiles are merged left to right, then the
//! job's material settings and overrides are applied on top, and the result
//! is written as the package's settings part. Packages exported by vendor
//! slicers with several tools in use keep their own settings part and
//! per-object tool assignments; everything else gets a clean merge.
//!
//! ```no_run
//! use platekit::profile::{EmbedConfig, EmbedRequest, ProfileCache, ProfileEmbedder, ProfileLocations};
//! use std::path::Path;
//!
//! let cache = ProfileCache::load(&ProfileLocations::new("/srv/orca_profiles"))?;
//! let embedder = ProfileEmbedder::new(&cache, EmbedConfig::default());
//! let report = embedder.embed(
//!     Path::new("upload.3mf"),
//!     Path::new("job.3mf"),
//!     &EmbedRequest::default().with_tool_count(2),
//! )?;
//! println!("{:?} with {} tool slots", report.path, report.tool_slots);
//! # Ok::<(), platekit::Error>(())
//! ```

pub mod cache;
pub mod embed;
pub mod keys;
pub mod rebuild;

pub use cache::{ProfileCache, ProfileLocations, load_profile};
pub use embed::{
    EmbedConfig, EmbedPath, EmbedReport, EmbedRequest, ProfileEmbedder, clamp_index_fields,
    clamp_tower_position, pad_tool_arrays, sanitize_model_settings,
};
pub use keys::{KeyKind, Profile, ProfileKey};
pub use rebuild::rebuild_clean;
