//! Sample points in Cartesian 3-space.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A mesh sample point: three Cartesian coordinates in the caller's units.
///
/// `Point3` is plain data. Ordering and hashing for deduplication go through
/// [`lex_key`](Point3::lex_key), which totals-orders the coordinates so that
/// loaders can sort and detect duplicates deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3([f64; 3]);

impl Point3 {
    /// Creates a point from its coordinate array.
    #[inline]
    pub const fn new(coords: [f64; 3]) -> Self {
        Self(coords)
    }

    #[inline]
    pub const fn x(&self) -> f64 {
        self.0[0]
    }

    #[inline]
    pub const fn y(&self) -> f64 {
        self.0[1]
    }

    #[inline]
    pub const fn z(&self) -> f64 {
        self.0[2]
    }

    /// The coordinate array.
    #[inline]
    pub const fn coords(&self) -> [f64; 3] {
        self.0
    }

    /// The point as a position vector.
    #[inline]
    pub fn to_vector(self) -> nalgebra::Vector3<f64> {
        nalgebra::Vector3::new(self.0[0], self.0[1], self.0[2])
    }

    /// Total-order key: lexicographic over (x, y, z).
    ///
    /// Used by the scattered-sample loader to sort records deterministically
    /// and to detect exact duplicate points.
    #[inline]
    pub fn lex_key(&self) -> [OrderedFloat<f64>; 3] {
        [
            OrderedFloat(self.0[0]),
            OrderedFloat(self.0[1]),
            OrderedFloat(self.0[2]),
        ]
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(coords: [f64; 3]) -> Self {
        Self(coords)
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> Self {
        p.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_array() {
        let p = Point3::new([1.0, -2.5, 3.25]);
        assert_eq!(p.x(), 1.0);
        assert_eq!(p.y(), -2.5);
        assert_eq!(p.z(), 3.25);
        assert_eq!(p.coords(), [1.0, -2.5, 3.25]);
    }

    #[test]
    fn lex_key_orders_lexicographically() {
        let a = Point3::new([0.0, 5.0, 5.0]);
        let b = Point3::new([1.0, -5.0, -5.0]);
        let c = Point3::new([1.0, -5.0, 0.0]);
        assert!(a.lex_key() < b.lex_key());
        assert!(b.lex_key() < c.lex_key());
    }

    #[test]
    fn lex_key_detects_exact_duplicates() {
        let a = Point3::new([0.1 + 0.2, 0.0, 0.0]);
        let b = Point3::new([0.1 + 0.2, 0.0, 0.0]);
        assert_eq!(a.lex_key(), b.lex_key());
    }

    #[test]
    fn vector_round_trip() {
        let p = Point3::new([1.0, 2.0, 3.0]);
        let v = p.to_vector();
        assert_eq!(v, nalgebra::Vector3::new(1.0, 2.0, 3.0));
    }
}
