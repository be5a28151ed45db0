//! # blink-transfer
//!
//! Transfer functions applied after cut-level normalization.
//!
//! A pixel value `v` inside the cut window `[min, max]` is normalized to
//! `t = (v - min) / (max - min)` in `[0, 1]`, passed through a transfer
//! function, and scaled to `[0, 255]`.
//!
//! # Supported Transfer Functions
//!
//! | Function | Curve | Use Case |
//! |----------|-------|----------|
//! | [`TransferFunction::Linear`] | `t` | Default |
//! | [`TransferFunction::Log`] | `log10(1 + a t) / log10(1 + a)` | Faint extended emission |
//! | [`TransferFunction::Sqrt`] | `sqrt(t)` | Mild stretch |
//! | [`TransferFunction::Squared`] | `t^2` | Bright-feature contrast |
//! | [`TransferFunction::Asinh`] | `asinh(b t) / asinh(b)` | High dynamic range |
//! | [`TransferFunction::HistEq`] | data CDF | Maximum contrast |
//!
//! Histogram equalization depends on the data, so it needs a
//! [`HistogramEqualizer`] built from pixel samples; the other curves are
//! pure functions.
//!
//! # Usage
//!
//! ```rust
//! use blink_transfer::TransferFunction;
//!
//! let tf: TransferFunction = "sqrt".parse().unwrap();
//! assert_eq!(tf.apply(0.25), 0.5);
//! assert_eq!(tf.inverse(0.5), 0.25);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod asinh;
pub mod histeq;
pub mod log;
pub mod power;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use histeq::HistogramEqualizer;

/// Unknown transfer function name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transfer function '{0}' (expected linear, log, sqrt, squared, asinh or histeq)")]
pub struct UnknownTransfer(pub String);

/// Curve mapping normalized pixel values to normalized display intensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferFunction {
    /// Identity.
    #[default]
    Linear,
    /// Logarithmic stretch.
    Log,
    /// Square root.
    Sqrt,
    /// Square.
    Squared,
    /// Inverse hyperbolic sine.
    Asinh,
    /// Histogram equalization.
    HistEq,
}

impl TransferFunction {
    /// All variants, in menu order.
    pub const ALL: [TransferFunction; 6] = [
        Self::Linear,
        Self::Log,
        Self::Sqrt,
        Self::Squared,
        Self::Asinh,
        Self::HistEq,
    ];

    /// Applies the curve to `t`, clamped to `[0, 1]` first.
    ///
    /// [`HistEq`](Self::HistEq) is data-dependent and behaves as linear here;
    /// use [`HistogramEqualizer::apply`] for it.
    #[inline]
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear | Self::HistEq => t,
            Self::Log => log::forward(t),
            Self::Sqrt => power::sqrt(t),
            Self::Squared => power::squared(t),
            Self::Asinh => asinh::forward(t),
        }
    }

    /// Inverse of [`apply`](Self::apply) on `[0, 1]`.
    #[inline]
    pub fn inverse(&self, y: f64) -> f64 {
        let y = y.clamp(0.0, 1.0);
        match self {
            Self::Linear | Self::HistEq => y,
            Self::Log => log::inverse(y),
            Self::Sqrt => power::squared(y),
            Self::Squared => power::sqrt(y),
            Self::Asinh => asinh::inverse(y),
        }
    }

    /// Whether the curve needs pixel statistics.
    #[inline]
    pub fn is_data_dependent(&self) -> bool {
        matches!(self, Self::HistEq)
    }

    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Log => "log",
            Self::Sqrt => "sqrt",
            Self::Squared => "squared",
            Self::Asinh => "asinh",
            Self::HistEq => "histeq",
        }
    }
}

impl std::fmt::Display for TransferFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransferFunction {
    type Err = UnknownTransfer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "lin" => Ok(Self::Linear),
            "log" => Ok(Self::Log),
            "sqrt" => Ok(Self::Sqrt),
            "squared" | "sqr" | "pow2" => Ok(Self::Squared),
            "asinh" => Ok(Self::Asinh),
            "histeq" | "histogram" => Ok(Self::HistEq),
            other => Err(UnknownTransfer(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn endpoints_fixed() {
        for tf in TransferFunction::ALL {
            assert_abs_diff_eq!(tf.apply(0.0), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(tf.apply(1.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn monotonic() {
        for tf in TransferFunction::ALL {
            let mut prev = -1.0;
            for i in 0..=100 {
                let y = tf.apply(i as f64 / 100.0);
                assert!(y >= prev, "{tf} not monotonic at {i}");
                prev = y;
            }
        }
    }

    #[test]
    fn inverse_matches() {
        for tf in TransferFunction::ALL {
            for &t in &[0.1, 0.37, 0.8] {
                assert_abs_diff_eq!(tf.inverse(tf.apply(t)), t, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn parse_names() {
        for tf in TransferFunction::ALL {
            assert_eq!(tf.name().parse::<TransferFunction>().unwrap(), tf);
        }
        assert!("gamma".parse::<TransferFunction>().is_err());
    }

    #[test]
    fn out_of_window_clamps() {
        assert_eq!(TransferFunction::Linear.apply(1.7), 1.0);
        assert_eq!(TransferFunction::Log.apply(-3.0), 0.0);
    }
}
