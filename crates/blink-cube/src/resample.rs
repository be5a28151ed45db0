//! Nearest-pixel resampling onto a reference projection.
//!
//! For every output pixel the reference WCS gives a sky position, the source
//! WCS turns it back into a source pixel, and the nearest source pixel is
//! copied. Output pixels that land outside the source or on the far
//! hemisphere keep the background value.

use blink_core::{PixelCoding, Wcs};
use rayon::prelude::*;

/// Width, height and calibration of a pixel grid.
#[derive(Debug, Clone, Copy)]
pub struct Grid<'a> {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Calibration, if any.
    pub wcs: Option<&'a Wcs>,
}

impl<'a> Grid<'a> {
    /// Creates a grid.
    pub fn new(width: usize, height: usize, wcs: Option<&'a Wcs>) -> Self {
        Self { width, height, wcs }
    }

    /// Whether pixels of `other` can be copied verbatim onto this grid.
    pub fn same_as(&self, other: &Grid<'_>) -> bool {
        self.width == other.width && self.height == other.height && self.wcs == other.wcs
    }
}

/// For every output pixel (FITS order, bottom row first) the FITS-ordered
/// index of the source pixel to copy, or `None` for background.
///
/// Both grids must be calibrated; returns `None` otherwise.
pub fn nearest_map(reference: &Grid<'_>, source: &Grid<'_>) -> Option<Vec<Option<usize>>> {
    let (ref_wcs, src_wcs) = (reference.wcs?, source.wcs?);
    let (w, h) = (reference.width, reference.height);
    let (sw, sh) = (source.width as f64, source.height as f64);

    let mut map = vec![None; w * h];
    if w == 0 {
        return Some(map);
    }
    map.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, slot) in row.iter_mut().enumerate() {
            let (ra, dec) = ref_wcs.pixel_to_sky(x as f64 + 1.0, y as f64 + 1.0);
            let Some((px, py)) = src_wcs.sky_to_pixel(ra, dec) else {
                continue;
            };
            let (sx, sy) = ((px - 1.0).round(), (py - 1.0).round());
            if sx >= 0.0 && sy >= 0.0 && sx < sw && sy < sh {
                *slot = Some(sy as usize * source.width + sx as usize);
            }
        }
    });
    Some(map)
}

/// Applies a map to display pixels (top row first on both sides).
pub fn apply_display(map: &[Option<usize>], reference: &Grid<'_>, source: &Grid<'_>, src: &[u8]) -> Vec<u8> {
    let (w, h) = (reference.width, reference.height);
    let mut out = vec![0u8; w * h];
    for (i, slot) in map.iter().enumerate() {
        if let Some(s) = *slot {
            let (sx, sy) = (s % source.width, s / source.width);
            let (x, y) = (i % w, i / w);
            out[(h - 1 - y) * w + x] = src[(source.height - 1 - sy) * source.width + sx];
        }
    }
    out
}

/// Applies a map to coded pixels (bottom row first on both sides), re-encoding
/// from `src_coding` into `dst_coding` when they differ.
pub fn apply_coded(
    map: &[Option<usize>],
    src: &[u8],
    src_coding: &PixelCoding,
    dst_coding: &PixelCoding,
) -> Vec<u8> {
    let bpp = dst_coding.bytes_per_pixel();
    let sbpp = src_coding.bytes_per_pixel();
    let background = background_code(dst_coding);
    let mut out = vec![0u8; map.len() * bpp];
    for (slot, dst) in map.iter().zip(out.chunks_exact_mut(bpp)) {
        match *slot {
            Some(s) => {
                let px = &src[s * sbpp..(s + 1) * sbpp];
                if src_coding.same_encoding(dst_coding) {
                    dst.copy_from_slice(px);
                } else {
                    recode(px, src_coding, dst_coding, dst);
                }
            }
            None => dst.copy_from_slice(&background),
        }
    }
    out
}

/// Re-encodes a whole coded slice.
pub fn recode_slice(src: &[u8], src_coding: &PixelCoding, dst_coding: &PixelCoding) -> Vec<u8> {
    if src_coding.same_encoding(dst_coding) {
        return src.to_vec();
    }
    let bpp = dst_coding.bytes_per_pixel();
    let n = src.len() / src_coding.bytes_per_pixel();
    let mut out = vec![0u8; n * bpp];
    for (px, dst) in src.chunks_exact(src_coding.bytes_per_pixel()).zip(out.chunks_exact_mut(bpp)) {
        recode(px, src_coding, dst_coding, dst);
    }
    out
}

fn recode(px: &[u8], src_coding: &PixelCoding, dst_coding: &PixelCoding, dst: &mut [u8]) {
    let physical = src_coding.physical(px);
    if physical.is_finite() {
        dst_coding.bit_depth.encode(dst_coding.coded(physical), dst);
    } else {
        dst.copy_from_slice(&background_code(dst_coding));
    }
}

/// Coded bytes of an empty pixel: NaN for floats, BLANK when declared,
/// otherwise physical zero.
pub fn background_code(coding: &PixelCoding) -> Vec<u8> {
    let mut bytes = vec![0u8; coding.bytes_per_pixel()];
    let value = if coding.bit_depth.is_float() {
        f64::NAN
    } else if let Some(blank) = coding.blank {
        blank as f64
    } else {
        coding.coded(0.0)
    };
    coding.bit_depth.encode(value, &mut bytes);
    bytes
}
