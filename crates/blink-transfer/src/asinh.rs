//! Inverse hyperbolic sine stretch.
//!
//! Linear near zero and logarithmic for large values:
//! `y = asinh(B t) / asinh(B)`.

/// Softening factor.
pub const B: f64 = 10.0;

/// Forward curve.
#[inline]
pub fn forward(t: f64) -> f64 {
    (B * t).asinh() / B.asinh()
}

/// Inverse curve.
#[inline]
pub fn inverse(y: f64) -> f64 {
    (y * B.asinh()).sinh() / B
}
