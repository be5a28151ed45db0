//! 256-entry RGB color table.
//!
//! Display pixels are 8-bit indices; a [`ColorTable`] turns them into RGB(A)
//! for blitting. Tables are built from control points with linear
//! interpolation between them.

use crate::{LutError, LutResult};

/// Number of entries in every table.
pub const TABLE_SIZE: usize = 256;

/// A 256-entry RGB lookup table.
///
/// # Example
///
/// ```rust
/// use blink_lut::ColorTable;
///
/// let gray = ColorTable::gray();
/// assert_eq!(gray.rgb(128), [128, 128, 128]);
/// assert_eq!(gray.reversed().rgb(0), [255, 255, 255]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    name: String,
    entries: Vec<[u8; 3]>,
}

impl ColorTable {
    /// Builds a table from exactly 256 entries.
    pub fn from_entries(name: impl Into<String>, entries: Vec<[u8; 3]>) -> LutResult<Self> {
        if entries.len() != TABLE_SIZE {
            return Err(LutError::InvalidSize(format!(
                "expected {TABLE_SIZE} entries, found {}",
                entries.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            entries,
        })
    }

    /// Builds a table by interpolating control points.
    ///
    /// Each point is `(position in [0, 1], rgb)`. Points must be sorted by
    /// position and there must be at least two.
    pub fn from_control_points(name: impl Into<String>, points: &[(f64, [u8; 3])]) -> LutResult<Self> {
        if points.len() < 2 {
            return Err(LutError::InvalidSize(format!(
                "need at least 2 control points, found {}",
                points.len()
            )));
        }
        if points.windows(2).any(|w| w[1].0 < w[0].0) {
            return Err(LutError::InvalidSize("control points are not sorted".into()));
        }

        let entries = (0..TABLE_SIZE)
            .map(|i| {
                let t = i as f64 / (TABLE_SIZE - 1) as f64;
                interpolate(points, t)
            })
            .collect();
        Ok(Self {
            name: name.into(),
            entries,
        })
    }

    /// Linear gray ramp.
    pub fn gray() -> Self {
        Self {
            name: "gray".into(),
            entries: (0..TABLE_SIZE).map(|i| [i as u8; 3]).collect(),
        }
    }

    /// Cubehelix ramp (Green 2011) with the usual start/rotation parameters.
    pub fn cubehelix() -> Self {
        let (start, rotations, hue, gamma) = (0.5_f64, -1.5_f64, 1.0_f64, 1.0_f64);
        let entries = (0..TABLE_SIZE)
            .map(|i| {
                let l = (i as f64 / (TABLE_SIZE - 1) as f64).powf(gamma);
                let phi = 2.0 * std::f64::consts::PI * (start / 3.0 + rotations * l);
                let amp = hue * l * (1.0 - l) / 2.0;
                let (s, c) = phi.sin_cos();
                let r = l + amp * (-0.14861 * c + 1.78277 * s);
                let g = l + amp * (-0.29227 * c - 0.90649 * s);
                let b = l + amp * (1.97294 * c);
                [to_byte(r), to_byte(g), to_byte(b)]
            })
            .collect();
        Self {
            name: "cubehelix".into(),
            entries,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Color for one display index.
    #[inline]
    pub fn rgb(&self, index: u8) -> [u8; 3] {
        self.entries[index as usize]
    }

    /// Same table with the ramp flipped (reverse video).
    pub fn reversed(&self) -> Self {
        let mut entries = self.entries.clone();
        entries.reverse();
        Self {
            name: format!("{}-reversed", self.name),
            entries,
        }
    }

    /// Expands display indices to RGBA bytes.
    pub fn to_rgba(&self, display: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(display.len() * 4);
        for &v in display {
            let [r, g, b] = self.rgb(v);
            out.extend_from_slice(&[r, g, b, 255]);
        }
        out
    }

    /// Expands display indices to RGB bytes.
    pub fn to_rgb(&self, display: &[u8]) -> Vec<u8> {
        display.iter().flat_map(|&v| self.rgb(v)).collect()
    }
}

fn interpolate(points: &[(f64, [u8; 3])], t: f64) -> [u8; 3] {
    let first = points[0];
    let last = points[points.len() - 1];
    if t <= first.0 {
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }
    for w in points.windows(2) {
        let ((p0, c0), (p1, c1)) = (w[0], w[1]);
        if t >= p0 && t <= p1 {
            let f = if p1 > p0 { (t - p0) / (p1 - p0) } else { 0.0 };
            let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
            return [mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2])];
        }
    }
    last.1
}

#[inline]
fn to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
