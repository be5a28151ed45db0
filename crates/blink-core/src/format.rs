//! Coded pixel formats.
//!
//! Original pixel data keeps the numeric encoding it was delivered in.
//! The encoding is identified by the FITS `BITPIX` code and stored big-endian,
//! which is also the layout of the on-disk cache files.
//!
//! # Code table
//!
//! | BITPIX | Variant | Storage | Signed |
//! |--------|---------|---------|--------|
//! | 8      | `U8`    | 1 byte  | no     |
//! | 16     | `I16`   | 2 bytes | yes    |
//! | 32     | `I32`   | 4 bytes | yes    |
//! | 64     | `I64`   | 8 bytes | yes    |
//! | -32    | `F32`   | 4 bytes | float  |
//! | -64    | `F64`   | 8 bytes | float  |
//!
//! # Usage
//!
//! ```rust
//! use blink_core::format::BitDepth;
//!
//! let depth = BitDepth::from_bitpix(16).unwrap();
//! assert_eq!(depth.bytes_per_pixel(), 2);
//!
//! // 0xFFFF is -1 once sign-extended
//! assert_eq!(depth.decode(&[0xFF, 0xFF]), -1.0);
//! ```

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Numeric encoding of coded (original) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitDepth {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
}

impl BitDepth {
    /// Looks up the FITS `BITPIX` code.
    pub fn from_bitpix(bitpix: i32) -> Result<Self> {
        match bitpix {
            8 => Ok(Self::U8),
            16 => Ok(Self::I16),
            32 => Ok(Self::I32),
            64 => Ok(Self::I64),
            -32 => Ok(Self::F32),
            -64 => Ok(Self::F64),
            other => Err(Error::UnsupportedBitDepth(other)),
        }
    }

    /// FITS `BITPIX` code for this encoding.
    #[inline]
    pub const fn bitpix(&self) -> i32 {
        match self {
            Self::U8 => 8,
            Self::I16 => 16,
            Self::I32 => 32,
            Self::I64 => 64,
            Self::F32 => -32,
            Self::F64 => -64,
        }
    }

    /// Bytes needed to store one coded pixel.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Whether this is a floating-point encoding.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Whether a BLANK keyword is meaningful for this encoding.
    #[inline]
    pub const fn supports_blank(&self) -> bool {
        !self.is_float()
    }

    /// Decodes one coded pixel from big-endian bytes.
    ///
    /// `bytes` must hold at least [`bytes_per_pixel`](Self::bytes_per_pixel) bytes.
    /// Integer codes are sign-extended (16/32/64) or zero-extended (8) before
    /// widening to `f64`.
    #[inline]
    pub fn decode(&self, bytes: &[u8]) -> f64 {
        match self {
            Self::U8 => bytes[0] as f64,
            Self::I16 => BigEndian::read_i16(bytes) as f64,
            Self::I32 => BigEndian::read_i32(bytes) as f64,
            Self::I64 => BigEndian::read_i64(bytes) as f64,
            Self::F32 => BigEndian::read_f32(bytes) as f64,
            Self::F64 => BigEndian::read_f64(bytes),
        }
    }

    /// Decodes the raw integer code, or `None` for float encodings.
    #[inline]
    pub fn decode_int(&self, bytes: &[u8]) -> Option<i64> {
        match self {
            Self::U8 => Some(bytes[0] as i64),
            Self::I16 => Some(BigEndian::read_i16(bytes) as i64),
            Self::I32 => Some(BigEndian::read_i32(bytes) as i64),
            Self::I64 => Some(BigEndian::read_i64(bytes)),
            Self::F32 | Self::F64 => None,
        }
    }

    /// Encodes a coded value into big-endian bytes.
    ///
    /// Integer encodings round to nearest and saturate at the type bounds.
    pub fn encode(&self, value: f64, out: &mut [u8]) {
        match self {
            Self::U8 => out[0] = value.round().clamp(0.0, u8::MAX as f64) as u8,
            Self::I16 => BigEndian::write_i16(out, value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16),
            Self::I32 => BigEndian::write_i32(out, value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32),
            Self::I64 => BigEndian::write_i64(out, value.round() as i64),
            Self::F32 => BigEndian::write_f32(out, value as f32),
            Self::F64 => BigEndian::write_f64(out, value),
        }
    }

    /// Encodes a whole slice of coded values.
    pub fn encode_all(&self, values: &[f64]) -> Vec<u8> {
        let bpp = self.bytes_per_pixel();
        let mut out = vec![0u8; values.len() * bpp];
        for (v, chunk) in values.iter().zip(out.chunks_exact_mut(bpp)) {
            self.encode(*v, chunk);
        }
        out
    }
}

impl std::fmt::Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8 => write!(f, "8-bit unsigned"),
            Self::I16 => write!(f, "16-bit signed"),
            Self::I32 => write!(f, "32-bit signed"),
            Self::I64 => write!(f, "64-bit signed"),
            Self::F32 => write!(f, "float"),
            Self::F64 => write!(f, "double"),
        }
    }
}

/// Affine calibration from coded to physical values, plus the blank code.
///
/// `physical = coded * bscale + bzero`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelCoding {
    /// Encoding of coded pixels.
    pub bit_depth: BitDepth,
    /// Scale factor (FITS `BSCALE`).
    pub bscale: f64,
    /// Offset (FITS `BZERO`).
    pub bzero: f64,
    /// Coded value marking missing data (FITS `BLANK`), integer encodings only.
    pub blank: Option<i64>,
}

impl PixelCoding {
    /// Coding with identity calibration and no blank value.
    pub fn new(bit_depth: BitDepth) -> Self {
        Self {
            bit_depth,
            bscale: 1.0,
            bzero: 0.0,
            blank: None,
        }
    }

    /// Sets the affine calibration.
    pub fn with_scale(mut self, bscale: f64, bzero: f64) -> Self {
        self.bscale = bscale;
        self.bzero = bzero;
        self
    }

    /// Sets the blank code. Ignored for float encodings.
    pub fn with_blank(mut self, blank: Option<i64>) -> Self {
        self.blank = if self.bit_depth.supports_blank() { blank } else { None };
        self
    }

    /// Bytes per coded pixel.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.bit_depth.bytes_per_pixel()
    }

    /// Decodes one coded pixel into its physical value.
    ///
    /// Blank codes and float NaNs decode to `NaN`.
    #[inline]
    pub fn physical(&self, bytes: &[u8]) -> f64 {
        if let Some(blank) = self.blank
            && self.bit_depth.decode_int(bytes) == Some(blank)
        {
            return f64::NAN;
        }
        self.bit_depth.decode(bytes) * self.bscale + self.bzero
    }

    /// Inverse calibration: physical value to coded value.
    #[inline]
    pub fn coded(&self, physical: f64) -> f64 {
        if self.bscale == 0.0 {
            return 0.0;
        }
        (physical - self.bzero) / self.bscale
    }

    /// Whether two codings describe bytes that may be copied verbatim.
    pub fn same_encoding(&self, other: &PixelCoding) -> bool {
        self.bit_depth == other.bit_depth
            && self.bscale == other.bscale
            && self.bzero == other.bzero
            && self.blank == other.blank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitpix_table() {
        for code in [8, 16, 32, 64, -32, -64] {
            assert_eq!(BitDepth::from_bitpix(code).unwrap().bitpix(), code);
        }
        assert!(BitDepth::from_bitpix(12).is_err());
    }

    #[test]
    fn sign_extension() {
        assert_eq!(BitDepth::U8.decode(&[0xFF]), 255.0);
        assert_eq!(BitDepth::I16.decode(&[0xFF, 0xFE]), -2.0);
        assert_eq!(BitDepth::I32.decode(&[0x80, 0, 0, 0]), i32::MIN as f64);
        assert_eq!(BitDepth::I16.decode(&[0x7F, 0xFF]), 32767.0);
    }

    #[test]
    fn encode_saturates() {
        let mut buf = [0u8; 2];
        BitDepth::I16.encode(70000.0, &mut buf);
        assert_eq!(BitDepth::I16.decode(&buf), 32767.0);
        let mut one = [0u8; 1];
        BitDepth::U8.encode(-4.0, &mut one);
        assert_eq!(one[0], 0);
    }

    #[test]
    fn float_codes() {
        let bytes = BitDepth::F32.encode_all(&[1.5, -0.25]);
        assert_eq!(BitDepth::F32.decode(&bytes[0..4]), 1.5);
        assert_eq!(BitDepth::F32.decode(&bytes[4..8]), -0.25);
        let bytes = BitDepth::F64.encode_all(&[1e300]);
        assert_eq!(BitDepth::F64.decode(&bytes), 1e300);
    }

    #[test]
    fn physical_with_scale_and_blank() {
        let coding = PixelCoding::new(BitDepth::I16)
            .with_scale(2.0, 32768.0)
            .with_blank(Some(-32768));
        let bytes = BitDepth::I16.encode_all(&[-32768.0, -32767.0, 100.0]);
        assert!(coding.physical(&bytes[0..2]).is_nan());
        assert_eq!(coding.physical(&bytes[2..4]), 2.0);
        assert_eq!(coding.physical(&bytes[4..6]), 33000.0);
        assert_eq!(coding.coded(33000.0), 100.0);
    }

    #[test]
    fn blank_ignored_for_floats() {
        let coding = PixelCoding::new(BitDepth::F32).with_blank(Some(0));
        assert_eq!(coding.blank, None);
    }
}
