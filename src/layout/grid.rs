//! Centered grid packing of identical footprints

use crate::config::BedSize;
use crate::error::{Error, Result};

/// Slack allowed when checking a cell against the bed edges, in mm
pub const FIT_TOLERANCE_MM: f64 = 0.5;

/// Columns and rows used for `count` copies
///
/// The grid is as square as possible: `cols = ceil(sqrt(count))` and
/// `rows = ceil(count / cols)`.
pub fn grid_shape(count: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let cols = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);
    (cols, rows)
}

/// Center positions for `count` copies of an `item_width` x `item_depth` footprint
///
/// Copies fill the grid row by row, starting at the low X/Y corner, and the
/// whole grid is centered on the bed. A single copy sits at the bed center.
pub fn grid_positions(
    bed: &BedSize,
    item_width: f64,
    item_depth: f64,
    count: usize,
    spacing: f64,
) -> Result<Vec<(f64, f64)>> {
    if count < 1 {
        return Err(Error::InvalidParameter(format!(
            "copy count must be at least 1, got {}",
            count
        )));
    }
    if count == 1 {
        return Ok(vec![bed.center()]);
    }

    let (cols, rows) = grid_shape(count);
    let cell_w = item_width + spacing;
    let cell_d = item_depth + spacing;

    let total_w = cols as f64 * cell_w - spacing;
    let total_d = rows as f64 * cell_d - spacing;
    let start_x = (bed.width - total_w) / 2.0 + item_width / 2.0;
    let start_y = (bed.depth - total_d) / 2.0 + item_depth / 2.0;

    Ok((0..count)
        .map(|i| {
            let col = (i % cols) as f64;
            let row = (i / cols) as f64;
            (start_x + col * cell_w, start_y + row * cell_d)
        })
        .collect())
}

/// Check whether every copy of the grid lies on the bed
pub fn fits_bed(
    bed: &BedSize,
    item_width: f64,
    item_depth: f64,
    count: usize,
    spacing: f64,
) -> Result<bool> {
    let positions = grid_positions(bed, item_width, item_depth, count, spacing)?;
    let half_w = item_width / 2.0;
    let half_d = item_depth / 2.0;

    Ok(positions.iter().all(|&(x, y)| {
        x - half_w >= -FIT_TOLERANCE_MM
            && x + half_w <= bed.width + FIT_TOLERANCE_MM
            && y - half_d >= -FIT_TOLERANCE_MM
            && y + half_d <= bed.depth + FIT_TOLERANCE_MM
    }))
}

/// Rough upper bound on how many copies fit side by side
///
/// Degenerate footprints report 1.
pub fn estimate_max_copies(bed: &BedSize, item_width: f64, item_depth: f64, spacing: f64) -> usize {
    if item_width <= 0.0 || item_depth <= 0.0 {
        return 1;
    }
    let cols = ((bed.width + spacing) / (item_width + spacing)).floor().max(1.0) as usize;
    let rows = ((bed.depth + spacing) / (item_depth + spacing)).floor().max(1.0) as usize;
    cols * rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bed() -> BedSize {
        BedSize::default()
    }

    #[test]
    fn test_single_copy_is_centered() {
        let positions = grid_positions(&bed(), 40.0, 30.0, 1, 5.0).unwrap();
        assert_eq!(positions, vec![(135.0, 135.0)]);
    }

    #[test]
    fn test_zero_copies_rejected() {
        let err = grid_positions(&bed(), 10.0, 10.0, 0, 5.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_four_copies_square() {
        assert_eq!(grid_shape(4), (2, 2));
        let positions = grid_positions(&bed(), 20.0, 20.0, 4, 10.0).unwrap();
        // total 50mm, starting 110 + 10
        assert_eq!(
            positions,
            vec![(120.0, 120.0), (150.0, 120.0), (120.0, 150.0), (150.0, 150.0)]
        );
    }

    #[test]
    fn test_shape_for_uneven_counts() {
        assert_eq!(grid_shape(1), (1, 1));
        assert_eq!(grid_shape(3), (2, 2));
        assert_eq!(grid_shape(5), (3, 2));
        assert_eq!(grid_shape(10), (4, 3));
    }

    #[test]
    fn test_fits_bed() {
        assert!(fits_bed(&bed(), 50.0, 50.0, 9, 5.0).unwrap());
        assert!(!fits_bed(&bed(), 100.0, 100.0, 9, 5.0).unwrap());
        // exactly the bed width fits thanks to the tolerance
        assert!(fits_bed(&bed(), 135.0, 135.0, 4, 0.0).unwrap());
    }

    #[test]
    fn test_estimate_max_copies() {
        assert_eq!(estimate_max_copies(&bed(), 50.0, 50.0, 5.0), 25);
        assert_eq!(estimate_max_copies(&bed(), 300.0, 300.0, 5.0), 1);
        assert_eq!(estimate_max_copies(&bed(), 0.0, 10.0, 5.0), 1);
    }
}
