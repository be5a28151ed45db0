//! Logarithmic stretch.
//!
//! `y = log10(1 + a t) / log10(1 + a)` with `a = 1000`, which lifts faint
//! values strongly while keeping `0 -> 0` and `1 -> 1`.
//!
//! # Range
//!
//! - Input/Output: [0, 1]

/// Stretch exponent base.
pub const A: f64 = 1000.0;

/// Forward curve.
///
/// # Example
///
/// ```rust
/// use blink_transfer::log::forward;
///
/// assert!(forward(0.01) > 0.3);
/// ```
#[inline]
pub fn forward(t: f64) -> f64 {
    (1.0 + A * t).log10() / (1.0 + A).log10()
}

/// Inverse curve.
#[inline]
pub fn inverse(y: f64) -> f64 {
    (10f64.powf(y * (1.0 + A).log10()) - 1.0) / A
}
