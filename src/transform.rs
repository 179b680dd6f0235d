//! Affine transforms as stored in 3MF attributes
//!
//! 3MF stores an affine transform as 12 numbers, `m00 m01 m02 m10 m11 m12
//! m20 m21 m22 m30 m31 m32`, where the last three values are the translation
//! (indices 9..11). Vendor assembly metadata uses a row-major 4x4 matrix of
//! 16 numbers with the translation at indices 3, 7 and 11. [`Transform`]
//! remembers which layout it was read from and writes the same one back.

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Number of values in a 3MF affine transform attribute
pub const AFFINE_LEN: usize = 12;

/// Number of values in a row-major 4x4 matrix
pub const MATRIX_LEN: usize = 16;

/// Identity transform in 3MF attribute form
pub const IDENTITY_ATTR: &str = "1 0 0 0 1 0 0 0 1 0 0 0";

/// Serialized layout of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// 12 values, 3MF order, translation at 9..11
    Affine3x4,
    /// 16 values, row-major, translation at 3, 7, 11
    RowMajor4x4,
}

/// An affine transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix4<f64>,
    layout: Layout,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// The identity transform
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
            layout: Layout::Affine3x4,
        }
    }

    /// A pure translation
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vector3::new(x, y, z)),
            layout: Layout::Affine3x4,
        }
    }

    /// Build from 12 (3MF) or 16 (row-major) values
    ///
    /// Returns `None` for any other length.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        match values.len() {
            AFFINE_LEN => {
                let v = values;
                #[rustfmt::skip]
                let matrix = Matrix4::new(
                    v[0], v[3], v[6], v[9],
                    v[1], v[4], v[7], v[10],
                    v[2], v[5], v[8], v[11],
                    0.0,  0.0,  0.0,  1.0,
                );
                Some(Self {
                    matrix,
                    layout: Layout::Affine3x4,
                })
            }
            MATRIX_LEN => Some(Self {
                matrix: Matrix4::from_row_slice(values),
                layout: Layout::RowMajor4x4,
            }),
            _ => None,
        }
    }

    /// Parse an attribute value
    ///
    /// Fails with a parse error on non-numeric values; returns `Ok(None)`
    /// when the value count matches neither layout.
    pub fn parse(attr: &str) -> Result<Option<Self>> {
        Ok(Self::from_values(&parse_values(attr)?))
    }

    /// The layout this transform serializes to
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The underlying column-vector matrix
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Translation part
    pub fn translation_part(&self) -> Vector3<f64> {
        Vector3::new(
            self.matrix[(0, 3)],
            self.matrix[(1, 3)],
            self.matrix[(2, 3)],
        )
    }

    /// Linear (rotation/scale) part
    pub fn linear_part(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Compose: the result applies `inner` first, then `self`
    pub fn then_after(&self, inner: &Transform) -> Transform {
        Transform {
            matrix: self.matrix * inner.matrix,
            layout: self.layout,
        }
    }

    /// Apply to a point
    pub fn apply(&self, x: f64, y: f64, z: f64) -> [f64; 3] {
        let p = self.matrix.transform_point(&Point3::new(x, y, z));
        [p.x, p.y, p.z]
    }

    /// Multiply the linear part by `factor`, keeping the translation
    pub fn scale_linear(&self, factor: f64) -> Transform {
        let mut matrix = self.matrix;
        for r in 0..3 {
            for c in 0..3 {
                matrix[(r, c)] *= factor;
            }
        }
        Transform {
            matrix,
            layout: self.layout,
        }
    }

    /// Multiply the translation by `factor`, keeping the linear part
    pub fn scale_translation(&self, factor: f64) -> Transform {
        let mut matrix = self.matrix;
        for r in 0..3 {
            matrix[(r, 3)] *= factor;
        }
        Transform {
            matrix,
            layout: self.layout,
        }
    }

    /// Values in this transform's serialized order
    pub fn to_values(&self) -> Vec<f64> {
        let m = &self.matrix;
        match self.layout {
            Layout::Affine3x4 => vec![
                m[(0, 0)],
                m[(1, 0)],
                m[(2, 0)],
                m[(0, 1)],
                m[(1, 1)],
                m[(2, 1)],
                m[(0, 2)],
                m[(1, 2)],
                m[(2, 2)],
                m[(0, 3)],
                m[(1, 3)],
                m[(2, 3)],
            ],
            Layout::RowMajor4x4 => (0..4)
                .flat_map(|r| (0..4).map(move |c| m[(r, c)]))
                .collect(),
        }
    }

    /// Attribute string in this transform's layout
    pub fn to_attr(&self) -> String {
        self.to_values()
            .into_iter()
            .map(format_number)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split a whitespace-separated list of numbers
pub fn parse_values(attr: &str) -> Result<Vec<f64>> {
    attr.split_whitespace()
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| Error::parse_error_with_context("transform value", s, "number"))
        })
        .collect()
}

/// Format a number with up to 6 decimals and no trailing zeros
///
/// `1.500000` becomes `1.5`, `2.000000` becomes `2`, `-0.000000` becomes `0`.
pub fn format_number(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Pad a 3MF transform to 16 values by appending `[0, 0, 0, 1]`
///
/// 16-value input is returned unchanged; any other length yields `None`.
pub fn pad_to_matrix(values: &[f64]) -> Option<[f64; MATRIX_LEN]> {
    let mut out = [0.0; MATRIX_LEN];
    match values.len() {
        AFFINE_LEN => {
            out[..AFFINE_LEN].copy_from_slice(values);
            out[15] = 1.0;
            Some(out)
        }
        MATRIX_LEN => {
            out.copy_from_slice(values);
            Some(out)
        }
        _ => None,
    }
}

/// Padded identity in the same 16-value form as [`pad_to_matrix`]
pub fn padded_identity() -> [f64; MATRIX_LEN] {
    [
        1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0000001), "0");
        assert_eq!(format_number(0.1234567), "0.123457");
        assert_eq!(format_number(-12.25), "-12.25");
    }

    #[test]
    fn test_affine_round_trip() {
        let attr = "1 0 0 0 1 0 0 0 1 10 20 30";
        let t = Transform::parse(attr).unwrap().unwrap();
        assert_eq!(t.layout(), Layout::Affine3x4);
        assert_eq!(t.translation_part(), Vector3::new(10.0, 20.0, 30.0));
        assert_eq!(t.to_attr(), attr);
    }

    #[test]
    fn test_row_major_translation() {
        let attr = "1 0 0 5 0 1 0 6 0 0 1 7 0 0 0 1";
        let t = Transform::parse(attr).unwrap().unwrap();
        assert_eq!(t.layout(), Layout::RowMajor4x4);
        assert_eq!(t.translation_part(), Vector3::new(5.0, 6.0, 7.0));
        assert_eq!(t.to_attr(), attr);
    }

    #[test]
    fn test_invalid_length_is_none() {
        assert!(Transform::parse("1 0 0").unwrap().is_none());
        assert!(Transform::parse("1 a 0").is_err());
    }

    #[test]
    fn test_apply_and_compose() {
        let item = Transform::translation(10.0, 0.0, 0.0);
        let scale = Transform::identity().scale_linear(2.0);
        let world = item.then_after(&scale);
        assert_eq!(world.apply(1.0, 1.0, 1.0), [12.0, 2.0, 2.0]);
    }

    #[test]
    fn test_3mf_column_order() {
        // 90 degree rotation about Z: x' = -y, y' = x
        let t = Transform::parse("0 1 0 -1 0 0 0 0 1 0 0 0")
            .unwrap()
            .unwrap();
        let p = t.apply(1.0, 0.0, 0.0);
        assert!((p[0] - 0.0).abs() < 1e-12);
        assert!((p[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scale_parts() {
        let t = Transform::parse("1 0 0 0 1 0 0 0 1 10 20 30")
            .unwrap()
            .unwrap();
        assert_eq!(t.scale_linear(1.5).to_attr(), "1.5 0 0 0 1.5 0 0 0 1.5 10 20 30");
        assert_eq!(t.scale_translation(0.5).to_attr(), "1 0 0 0 1 0 0 0 1 5 10 15");
    }

    #[test]
    fn test_pad_to_matrix() {
        let padded = pad_to_matrix(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 3.0, 4.0, 5.0])
            .unwrap();
        assert_eq!(&padded[9..12], &[3.0, 4.0, 5.0]);
        assert_eq!(&padded[12..], &[0.0, 0.0, 0.0, 1.0]);
        assert!(pad_to_matrix(&[1.0; 5]).is_none());
    }
}
