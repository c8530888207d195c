//! Epsilon-tolerant floating-point comparisons.
//!
//! Used by the grid builder (axis deduplication, unit-disk trimming) and the
//! evaluators. The tolerance is an absolute bound chosen by the caller per
//! comparison; quantities here are dimensionless direction cosines or
//! normalized weights, so a fixed absolute epsilon is appropriate.

/// `a` and `b` agree to within `tol`.
#[inline]
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// `a` is less than `b` by more than `tol`.
#[inline]
pub fn definitely_less(a: f64, b: f64, tol: f64) -> bool {
    b - a > tol
}

/// `a` is greater than `b` by more than `tol`.
#[inline]
pub fn definitely_greater(a: f64, b: f64, tol: f64) -> bool {
    a - b > tol
}
