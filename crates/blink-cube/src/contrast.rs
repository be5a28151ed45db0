//! Coded pixels to 8-bit display pixels.
//!
//! For every coded pixel:
//!
//! ```text
//! coded --(BSCALE/BZERO)--> physical --(cut window)--> t in [0,1]
//!       --(transfer)--> y in [0,1] --> byte = trunc(y * 255)
//! ```
//!
//! Coded slices are stored bottom row first and display buffers top row
//! first. [`ContrastEngine::remap`] is the only place that flips rows.
//! Blank and NaN pixels map to 0.

use blink_core::PixelCoding;
use blink_lut::{ColorTable, ColorTableId, ColorTableSet, LutResult};
use blink_transfer::{HistogramEqualizer, TransferFunction};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::autocut::{AutocutStrategy, PercentileAutocut};

/// Upper bound on pixels sampled for autocut and equalization.
pub const DEFAULT_MAX_SAMPLES: usize = 100_000;

/// Contrast settings shared by all frames of a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastState {
    /// Physical value mapped to display 0.
    pub cut_min: f64,
    /// Physical value mapped to display 255.
    pub cut_max: f64,
    /// Curve applied inside the window.
    pub transfer: TransferFunction,
    /// Color table used when rendering.
    pub color_table: ColorTableId,
    /// Flip the color ramp.
    pub reverse_video: bool,
}

impl Default for ContrastState {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

impl ContrastState {
    /// Linear gray state with the given window. The bounds are ordered so
    /// that `cut_min <= cut_max` always holds.
    pub fn new(cut_min: f64, cut_max: f64) -> Self {
        let (cut_min, cut_max) = order(cut_min, cut_max);
        Self {
            cut_min,
            cut_max,
            transfer: TransferFunction::Linear,
            color_table: ColorTableId::Gray,
            reverse_video: false,
        }
    }

    /// Sets the transfer function.
    pub fn with_transfer(mut self, transfer: TransferFunction) -> Self {
        self.transfer = transfer;
        self
    }

    /// Sets the color table.
    pub fn with_color_table(mut self, id: ColorTableId, reverse_video: bool) -> Self {
        self.color_table = id;
        self.reverse_video = reverse_video;
        self
    }

    /// Replaces the cut window, ordering the bounds.
    pub fn set_cuts(&mut self, cut_min: f64, cut_max: f64) {
        (self.cut_min, self.cut_max) = order(cut_min, cut_max);
    }

    /// Resolves the color table, reversed when reverse video is on.
    pub fn table(&self, tables: &ColorTableSet) -> LutResult<ColorTable> {
        tables.resolve(&self.color_table, self.reverse_video)
    }

    /// Normalizes a physical value into the window.
    #[inline]
    fn normalize(&self, v: f64) -> f64 {
        let span = self.cut_max - self.cut_min;
        if span <= 0.0 {
            return if v >= self.cut_max { 1.0 } else { 0.0 };
        }
        ((v - self.cut_min) / span).clamp(0.0, 1.0)
    }
}

fn order(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Maps coded slices to display pixels under a [`ContrastState`].
#[derive(Debug)]
pub struct ContrastEngine {
    strategy: Box<dyn AutocutStrategy>,
    max_samples: usize,
}

impl Default for ContrastEngine {
    fn default() -> Self {
        Self::with_strategy(PercentileAutocut::default())
    }
}

impl ContrastEngine {
    /// Engine using a custom autocut strategy.
    pub fn with_strategy(strategy: impl AutocutStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    /// Limits the number of pixels sampled for statistics.
    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples.max(1);
        self
    }

    /// Name of the autocut strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Evenly strided finite physical samples of a coded slice.
    pub fn sample(&self, coded: &[u8], coding: &PixelCoding) -> Vec<f64> {
        let bpp = coding.bytes_per_pixel();
        let n = coded.len() / bpp;
        let stride = n.div_ceil(self.max_samples).max(1);
        coded
            .chunks_exact(bpp)
            .step_by(stride)
            .map(|px| coding.physical(px))
            .filter(|v| v.is_finite())
            .collect()
    }

    /// Cut levels computed from the data, or `None` for an all-blank slice.
    pub fn autocut(&self, coded: &[u8], coding: &PixelCoding) -> Option<(f64, f64)> {
        let mut samples = self.sample(coded, coding);
        let cuts = self.strategy.cuts(&mut samples);
        trace!(strategy = self.strategy.name(), samples = samples.len(), ?cuts, "autocut");
        cuts
    }

    /// Equalization table for `state`, when its transfer function needs one.
    pub fn equalizer(&self, coded: &[u8], coding: &PixelCoding, state: &ContrastState) -> Option<HistogramEqualizer> {
        if !state.transfer.is_data_dependent() {
            return None;
        }
        let samples = self.sample(coded, coding).into_iter().map(|v| state.normalize(v));
        Some(HistogramEqualizer::from_samples(samples, blink_transfer::histeq::DEFAULT_BINS))
    }

    /// Display byte for one physical value.
    #[inline]
    pub fn map_value(physical: f64, state: &ContrastState, eq: Option<&HistogramEqualizer>) -> u8 {
        if !physical.is_finite() {
            return 0;
        }
        let t = state.normalize(physical);
        let y = match eq {
            Some(eq) if state.transfer.is_data_dependent() => eq.apply(t),
            _ => state.transfer.apply(t),
        };
        (y.clamp(0.0, 1.0) * 255.0) as u8
    }

    /// Physical value at the lower edge of a display byte's bucket.
    pub fn unmap_value(display: u8, state: &ContrastState) -> f64 {
        let y = display as f64 / 255.0;
        state.cut_min + state.transfer.inverse(y) * (state.cut_max - state.cut_min)
    }

    /// Remaps a coded slice (bottom row first) to display pixels (top row
    /// first), building an equalizer from this slice when needed.
    pub fn remap(&self, coded: &[u8], coding: &PixelCoding, width: usize, height: usize, state: &ContrastState) -> Vec<u8> {
        let eq = self.equalizer(coded, coding, state);
        self.remap_with(coded, coding, width, height, state, eq.as_ref())
    }

    /// Remaps with a caller-supplied equalizer, so a whole stack can share one.
    pub fn remap_with(
        &self,
        coded: &[u8],
        coding: &PixelCoding,
        width: usize,
        height: usize,
        state: &ContrastState,
        eq: Option<&HistogramEqualizer>,
    ) -> Vec<u8> {
        let bpp = coding.bytes_per_pixel();
        let mut display = vec![0u8; width * height];
        if width == 0 {
            return display;
        }
        display.par_chunks_mut(width).enumerate().for_each(|(row, out)| {
            let src_row = height - 1 - row;
            let src = &coded[src_row * width * bpp..(src_row + 1) * width * bpp];
            for (dst, px) in out.iter_mut().zip(src.chunks_exact(bpp)) {
                *dst = Self::map_value(coding.physical(px), state, eq);
            }
        });
        display
    }

    /// Resolves the cut window: computed from `coded` when `autocut` is set,
    /// otherwise the supplied bounds. Falls back to the supplied bounds for
    /// an all-blank slice.
    pub fn resolve_cuts(&self, coded: &[u8], coding: &PixelCoding, min: f64, max: f64, autocut: bool) -> (f64, f64) {
        if autocut && let Some(cuts) = self.autocut(coded, coding) {
            return cuts;
        }
        order(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use blink_core::BitDepth;

    fn i16_slice(values: &[f64]) -> (Vec<u8>, PixelCoding) {
        (BitDepth::I16.encode_all(values), PixelCoding::new(BitDepth::I16))
    }

    #[test]
    fn linear_cut_points() {
        let state = ContrastState::new(1000.0, 5000.0);
        assert_eq!(ContrastEngine::map_value(1000.0, &state, None), 0);
        assert_eq!(ContrastEngine::map_value(5000.0, &state, None), 255);
        assert_eq!(ContrastEngine::map_value(3000.0, &state, None), 127);
        assert_eq!(ContrastEngine::map_value(-7.0, &state, None), 0);
        assert_eq!(ContrastEngine::map_value(f64::NAN, &state, None), 0);
    }

    #[test]
    fn inverse_within_one_step() {
        let state = ContrastState::new(-200.0, 800.0);
        let step = (state.cut_max - state.cut_min) / 255.0;
        for i in 0..=1000 {
            let v = -200.0 + i as f64;
            let b = ContrastEngine::map_value(v, &state, None);
            let back = ContrastEngine::unmap_value(b, &state);
            assert!((back - v).abs() <= step + 1e-9, "{v} -> {b} -> {back}");
        }
    }

    #[test]
    fn rows_are_flipped_once() {
        // 2x3 slice, bottom row first: rows hold 0, 100, 200
        let (coded, coding) = i16_slice(&[0.0, 0.0, 100.0, 100.0, 200.0, 200.0]);
        let engine = ContrastEngine::default();
        let state = ContrastState::new(0.0, 200.0);
        let display = engine.remap(&coded, &coding, 2, 3, &state);
        assert_eq!(display, vec![255, 255, 127, 127, 0, 0]);

        // flipping the display back gives the coded row order
        let unflipped: Vec<u8> = display.chunks(2).rev().flatten().copied().collect();
        assert_eq!(unflipped, vec![0, 0, 127, 127, 255, 255]);
        assert_ne!(unflipped, display);
    }

    #[test]
    fn remap_is_idempotent() {
        let values: Vec<f64> = (0..64).map(|i| (i * 37 % 101) as f64).collect();
        let (coded, coding) = i16_slice(&values);
        let engine = ContrastEngine::default();
        let state = ContrastState::new(3.0, 90.0).with_transfer(TransferFunction::HistEq);
        let a = engine.remap(&coded, &coding, 8, 8, &state);
        let b = engine.remap(&coded, &coding, 8, 8, &state);
        assert_eq!(a, b);
    }

    #[test]
    fn blank_maps_to_zero() {
        let coding = PixelCoding::new(BitDepth::I16).with_blank(Some(-1));
        let coded = BitDepth::I16.encode_all(&[-1.0, 50.0]);
        let engine = ContrastEngine::default();
        let display = engine.remap(&coded, &coding, 2, 1, &ContrastState::new(0.0, 50.0));
        assert_eq!(display, vec![0, 255]);
        let (lo, hi) = engine.resolve_cuts(&coded, &coding, 0.0, 1.0, true);
        assert_abs_diff_eq!(lo, 50.0);
        assert_abs_diff_eq!(hi, 50.0);
    }

    #[test]
    fn cuts_are_ordered() {
        let mut state = ContrastState::new(9.0, 1.0);
        assert!(state.cut_min <= state.cut_max);
        state.set_cuts(4.0, -4.0);
        assert_eq!((state.cut_min, state.cut_max), (-4.0, 4.0));
    }

    #[test]
    fn degenerate_window_is_a_threshold() {
        let state = ContrastState::new(10.0, 10.0);
        assert_eq!(ContrastEngine::map_value(9.9, &state, None), 0);
        assert_eq!(ContrastEngine::map_value(10.0, &state, None), 255);
    }
}
