//! Histogram equalization.
//!
//! Builds a cumulative distribution from normalized samples and maps each
//! value to its rank, spreading the display range evenly over the data.

/// Default histogram resolution.
pub const DEFAULT_BINS: usize = 4096;

/// Equalization table over `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramEqualizer {
    cdf: Vec<f64>,
}

impl HistogramEqualizer {
    /// Builds the table from normalized samples. Non-finite samples are ignored
    /// and values outside `[0, 1]` are clamped.
    ///
    /// With no usable samples the table is the identity.
    pub fn from_samples(samples: impl IntoIterator<Item = f64>, bins: usize) -> Self {
        let bins = bins.max(2);
        let mut hist = vec![0u64; bins];
        let mut total = 0u64;
        for t in samples.into_iter().filter(|t| t.is_finite()) {
            hist[Self::bin_of(t, bins)] += 1;
            total += 1;
        }

        if total == 0 {
            let cdf = (0..bins).map(|i| i as f64 / (bins - 1) as f64).collect();
            return Self { cdf };
        }

        let mut acc = 0u64;
        let cdf = hist
            .iter()
            .map(|&count| {
                acc += count;
                acc as f64 / total as f64
            })
            .collect();
        Self { cdf }
    }

    #[inline]
    fn bin_of(t: f64, bins: usize) -> usize {
        ((t.clamp(0.0, 1.0) * (bins - 1) as f64).round() as usize).min(bins - 1)
    }

    /// Maps a normalized value to its equalized intensity.
    #[inline]
    pub fn apply(&self, t: f64) -> f64 {
        self.cdf[Self::bin_of(t, self.cdf.len())]
    }

    /// Number of bins.
    pub fn bins(&self) -> usize {
        self.cdf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skewed_data_spreads() {
        // 90% of samples crowd the bottom tenth
        let samples = (0..1000).map(|i| if i < 900 { i as f64 / 9000.0 } else { i as f64 / 1000.0 });
        let eq = HistogramEqualizer::from_samples(samples, 256);
        assert!(eq.apply(0.1) > 0.85);
        assert_eq!(eq.apply(1.0), 1.0);
    }

    #[test]
    fn monotonic_and_bounded() {
        let eq = HistogramEqualizer::from_samples((0..500).map(|i| (i % 37) as f64 / 36.0), 128);
        let mut prev = 0.0;
        for i in 0..=100 {
            let y = eq.apply(i as f64 / 100.0);
            assert!(y >= prev && y <= 1.0);
            prev = y;
        }
    }

    #[test]
    fn empty_is_identity() {
        let eq = HistogramEqualizer::from_samples([f64::NAN], 11);
        assert_eq!(eq.apply(0.5), 0.5);
        assert_eq!(eq.bins(), 11);
    }
}
