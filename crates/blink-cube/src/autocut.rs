//! Automatic cut-level strategies.
//!
//! A strategy receives finite physical samples of one slice and returns the
//! `[min, max]` window to display. Strategies are pluggable behind
//! [`AutocutStrategy`] so the statistic can be swapped without touching the
//! contrast engine.

/// Computes cut levels from pixel samples.
pub trait AutocutStrategy: Send + Sync + std::fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Returns `(min, max)` for the samples, or `None` when there are none.
    ///
    /// `samples` only holds finite values and may be reordered.
    fn cuts(&self, samples: &mut [f64]) -> Option<(f64, f64)>;
}

/// Cuts at two quantiles of the sample distribution.
///
/// The default 0.3% / 99.7% keeps isolated hot or dead pixels from
/// flattening the whole frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileAutocut {
    /// Lower quantile in `[0, 1]`.
    pub low: f64,
    /// Upper quantile in `[0, 1]`.
    pub high: f64,
}

impl Default for PercentileAutocut {
    fn default() -> Self {
        Self {
            low: 0.003,
            high: 0.997,
        }
    }
}

impl AutocutStrategy for PercentileAutocut {
    fn name(&self) -> &'static str {
        "percentile"
    }

    fn cuts(&self, samples: &mut [f64]) -> Option<(f64, f64)> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable_by(f64::total_cmp);
        let last = samples.len() - 1;
        let at = |q: f64| samples[((last as f64) * q.clamp(0.0, 1.0)).round() as usize];
        let (lo, hi) = (at(self.low.min(self.high)), at(self.high.max(self.low)));
        if lo < hi {
            Some((lo, hi))
        } else {
            // flat core: fall back to the full range
            Some((samples[0], samples[last]))
        }
    }
}

/// Cuts at the sample extremes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MinMaxAutocut;

impl AutocutStrategy for MinMaxAutocut {
    fn name(&self) -> &'static str {
        "minmax"
    }

    fn cuts(&self, samples: &mut [f64]) -> Option<(f64, f64)> {
        let first = *samples.first()?;
        Some(
            samples
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_ignores_outliers() {
        let mut samples: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        samples[0] = -1e9;
        samples[999] = 1e9;
        let (lo, hi) = PercentileAutocut::default().cuts(&mut samples).unwrap();
        assert!(lo > 0.0 && lo < 10.0);
        assert!(hi > 990.0 && hi < 1000.0);
    }

    #[test]
    fn flat_data_falls_back_to_range() {
        let mut samples = vec![5.0; 100];
        samples.push(6.0);
        let cuts = PercentileAutocut::default().cuts(&mut samples).unwrap();
        assert_eq!(cuts, (5.0, 6.0));
    }

    #[test]
    fn minmax_and_empty() {
        let mut samples = vec![3.0, -2.0, 8.0];
        assert_eq!(MinMaxAutocut.cuts(&mut samples), Some((-2.0, 8.0)));
        assert_eq!(MinMaxAutocut.cuts(&mut []), None);
        assert_eq!(PercentileAutocut::default().cuts(&mut []), None);
    }
}
