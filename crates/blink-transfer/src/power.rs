//! Power-law curves.

/// Square root.
#[inline]
pub fn sqrt(t: f64) -> f64 {
    if t <= 0.0 { 0.0 } else { t.sqrt() }
}

/// Square.
#[inline]
pub fn squared(t: f64) -> f64 {
    t * t
}
