// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column-major 4×4 layer transform.
//!
//! Layer transforms travel on the wire and reach backends as full 4×4
//! matrices, but current usage is restricted to 2-D affine transforms.
//! [`Transform3d::from_affine`] and [`Transform3d::as_affine`] bridge to
//! [`kurbo::Affine`] for the 2-D case.

use core::ops::Mul;

use kurbo::{Affine, Point};

/// A column-major 4×4 affine transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, matching the memory layout
/// used by GPU APIs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from a column-major 2-D array.
    #[inline]
    #[must_use]
    pub const fn from_cols_array_2d(cols: [[f64; 4]; 4]) -> Self {
        Self { cols }
    }

    /// Returns the columns as a 2-D array.
    #[inline]
    #[must_use]
    pub const fn to_cols_array_2d(self) -> [[f64; 4]; 4] {
        self.cols
    }

    /// Creates a pure 2-D translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, 0.0, 1.0],
            ],
        }
    }

    /// Creates a non-uniform 2-D scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Embeds a 2-D affine transform into the 4×4 matrix.
    #[inline]
    #[must_use]
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        Self {
            cols: [
                [a, b, 0.0, 0.0],
                [c, d, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [e, f, 0.0, 1.0],
            ],
        }
    }

    /// Projects back to a 2-D affine transform.
    ///
    /// Returns `None` if the matrix uses any non-affine or out-of-plane
    /// component (Z rows/columns or perspective terms).
    #[must_use]
    pub fn as_affine(&self) -> Option<Affine> {
        if !self.is_2d() {
            return None;
        }
        let c = &self.cols;
        Some(Affine::new([
            c[0][0], c[0][1], c[1][0], c[1][1], c[3][0], c[3][1],
        ]))
    }

    /// Returns whether the transform stays within the XY plane.
    #[must_use]
    pub fn is_2d(&self) -> bool {
        let c = &self.cols;
        // Z row and column must be identity, and no perspective terms.
        c[0][2] == 0.0
            && c[0][3] == 0.0
            && c[1][2] == 0.0
            && c[1][3] == 0.0
            && c[2] == [0.0, 0.0, 1.0, 0.0]
            && c[3][2] == 0.0
            && c[3][3] == 1.0
    }

    /// Maps a 2-D point through the transform, ignoring Z.
    #[inline]
    #[must_use]
    pub fn transform_point(&self, p: Point) -> Point {
        let c = &self.cols;
        Point::new(
            c[0][0] * p.x + c[1][0] * p.y + c[3][0],
            c[0][1] * p.x + c[1][1] * p.y + c[3][1],
        )
    }

    /// Is every element of this transform [finite](f64::is_finite)?
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols
            .iter()
            .all(|col| col.iter().all(|v| v.is_finite()))
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform3d::default(), Transform3d::IDENTITY);
    }

    #[test]
    fn identity_multiply() {
        let t = Transform3d::from_translation(1.0, 2.0);
        assert_eq!(Transform3d::IDENTITY * t, t);
        assert_eq!(t * Transform3d::IDENTITY, t);
    }

    #[test]
    fn translation_composition() {
        let a = Transform3d::from_translation(1.0, 0.0);
        let b = Transform3d::from_translation(0.0, 2.0);
        let c = a * b;
        assert_eq!(c.cols[3], [1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn affine_round_trip() {
        let affine = Affine::translate((3.0, 4.0)) * Affine::scale(2.0);
        let t = Transform3d::from_affine(affine);
        assert!(t.is_2d());
        let back = t.as_affine().unwrap();
        assert_eq!(back.as_coeffs(), affine.as_coeffs());
    }

    #[test]
    fn non_planar_transform_is_not_2d() {
        let mut t = Transform3d::IDENTITY;
        t.cols[3][2] = 5.0; // Z translation
        assert!(!t.is_2d());
        assert!(t.as_affine().is_none());
    }

    #[test]
    fn transform_point_matches_affine() {
        let affine = Affine::translate((10.0, -2.0)) * Affine::scale_non_uniform(2.0, 3.0);
        let t = Transform3d::from_affine(affine);
        let p = Point::new(4.0, 5.0);
        assert_eq!(t.transform_point(p), affine * p);
    }

    #[test]
    fn scale_then_translate() {
        let s = Transform3d::from_scale(2.0, 2.0);
        let t = Transform3d::from_translation(3.0, 4.0);
        let combined = t * s;
        assert_eq!(combined.transform_point(Point::new(1.0, 1.0)), Point::new(5.0, 6.0));
    }

    #[test]
    fn infinity_detected() {
        let mut t = Transform3d::IDENTITY;
        t.cols[0][3] = f64::INFINITY;
        assert!(!t.is_finite());
        assert!(Transform3d::IDENTITY.is_finite());
    }
}
