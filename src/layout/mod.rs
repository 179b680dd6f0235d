//! Placement rewrites: grid duplication and scaling
//!
//! [`grid`] computes where copies go, [`duplicate`](mod@duplicate) turns a
//! single-object package into a grid of copies and [`scale`](mod@scale)
//! rescales placements. Each rewrite reads a source package and writes a new
//! one; the source is never modified.

pub mod duplicate;
pub mod grid;
pub mod scale;

pub use duplicate::{DuplicateReport, DuplicateRequest, duplicate};
pub use grid::{FIT_TOLERANCE_MM, estimate_max_copies, fits_bed, grid_positions, grid_shape};
pub use scale::{ScaleMode, scale};
