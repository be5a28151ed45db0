//! Plane variants that can feed a multi-frame stack.
//!
//! A view layer holds many kinds of planes. Instead of downcasting, callers
//! match on [`Plane`] and ask capability questions:
//!
//! ```rust
//! use blink_core::plane::{ImagePlane, Plane};
//!
//! let img = ImagePlane::from_display(2, 2, vec![0, 1, 2, 3], "dss");
//! let plane: Plane = Plane::PlainImage(img);
//! assert!(!plane.has_original_pixels());
//! assert!(!plane.supports_cube_ops());
//! ```

use crate::format::PixelCoding;
use crate::header::Header;
use crate::wcs::Wcs;
use crate::{Error, Result};

/// A decoded 2D image plane.
///
/// `display` is top row first; `original`, when present, is bottom row first
/// in the encoding given by `coding`.
#[derive(Debug, Clone)]
pub struct ImagePlane {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// 8-bit display pixels, top row first.
    pub display: Vec<u8>,
    /// Coded original pixels, bottom row first.
    pub original: Option<Vec<u8>>,
    /// Encoding of `original`.
    pub coding: Option<PixelCoding>,
    /// Astrometric calibration.
    pub wcs: Option<Wcs>,
    /// Keyword header.
    pub header: Header,
    /// Provenance label.
    pub label: String,
}

impl ImagePlane {
    /// Plane with display pixels only.
    pub fn from_display(width: usize, height: usize, display: Vec<u8>, label: impl Into<String>) -> Self {
        Self {
            width,
            height,
            display,
            original: None,
            coding: None,
            wcs: None,
            header: Header::new(),
            label: label.into(),
        }
    }

    /// Attaches original pixels and their encoding.
    ///
    /// Fails when the byte count does not match `width * height` coded pixels.
    pub fn with_original(mut self, original: Vec<u8>, coding: PixelCoding) -> Result<Self> {
        let expected = self.width * self.height * coding.bytes_per_pixel();
        if original.len() != expected {
            return Err(Error::other(format!(
                "plane '{}' has {} original bytes, expected {expected}",
                self.label,
                original.len()
            )));
        }
        self.original = Some(original);
        self.coding = Some(coding);
        Ok(self)
    }

    /// Checks that the display buffer holds `width * height` pixels and
    /// that original bytes, when present, match their encoding.
    pub fn validate(&self) -> Result<()> {
        let pixels = self.width * self.height;
        if self.width == 0 || self.height == 0 || self.display.len() != pixels {
            // display length reported as a single row
            return Err(Error::dimension_mismatch((self.width, self.height), (self.display.len(), 1)));
        }
        if let (Some(original), Some(coding)) = (&self.original, &self.coding)
            && original.len() != pixels * coding.bytes_per_pixel()
        {
            return Err(Error::other(format!(
                "plane '{}' has {} original bytes, expected {}",
                self.label,
                original.len(),
                pixels * coding.bytes_per_pixel()
            )));
        }
        Ok(())
    }

    /// Attaches a calibration.
    pub fn with_wcs(mut self, wcs: Wcs) -> Self {
        self.wcs = Some(wcs);
        self
    }

    /// Attaches a header.
    pub fn with_header(mut self, header: Header) -> Self {
        self.header = header;
        self
    }
}

/// A color image with three 8-bit channels, top row first.
#[derive(Debug, Clone)]
pub struct RgbPlane {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Interleaved RGB bytes.
    pub rgb: Vec<u8>,
    /// Provenance label.
    pub label: String,
}

/// A tiled image too large to hold as one plane; only its descriptor lives here.
#[derive(Debug, Clone)]
pub struct HugePlane {
    /// Full width in pixels.
    pub width: usize,
    /// Full height in pixels.
    pub height: usize,
    /// Provenance label.
    pub label: String,
}

/// Closed set of plane variants.
///
/// The `BlinkCube` variant carries an opaque handle so this crate stays free
/// of the stack implementation.
#[derive(Debug, Clone)]
pub enum Plane<C = ()> {
    /// Single 2D image, possibly with original pixels.
    PlainImage(ImagePlane),
    /// Color composite.
    RgbImage(RgbPlane),
    /// Multi-frame blink/cube stack.
    BlinkCube(C),
    /// Tiled large image.
    HugeImage(HugePlane),
}

impl<C> Plane<C> {
    /// Whether true pixel values can be produced.
    pub fn has_original_pixels(&self) -> bool {
        match self {
            Self::PlainImage(p) => p.original.is_some(),
            Self::BlinkCube(_) => true,
            Self::RgbImage(_) | Self::HugeImage(_) => false,
        }
    }

    /// Whether frame-axis operations (activation, permutation, extraction) apply.
    pub fn supports_cube_ops(&self) -> bool {
        matches!(self, Self::BlinkCube(_))
    }

    /// Whether the plane can be appended to a stack as a new frame.
    pub fn is_stackable(&self) -> bool {
        matches!(self, Self::PlainImage(_))
    }

    /// Short variant name for logs and errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::PlainImage(_) => "image",
            Self::RgbImage(_) => "rgb",
            Self::BlinkCube(_) => "cube",
            Self::HugeImage(_) => "huge",
        }
    }

    /// Borrows the 2D image, or fails with [`Error::UnsupportedPlane`].
    pub fn as_image(&self) -> Result<&ImagePlane> {
        match self {
            Self::PlainImage(p) => Ok(p),
            other => Err(Error::UnsupportedPlane(format!(
                "{} plane cannot be used as a frame",
                other.kind_name()
            ))),
        }
    }
}
