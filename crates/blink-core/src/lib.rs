//! # blink-core
//!
//! Foundation types for multi-frame image stacks.
//!
//! - [`BitDepth`], [`PixelCoding`] - coded pixel encodings and their calibration
//! - [`FrameBuffer`] - one 2D slice with display and original pixels
//! - [`Header`] - FITS-style keyword list with axis renumbering
//! - [`Wcs`] - gnomonic sky projection
//! - [`Plane`] - closed set of plane variants with capability queries
//! - [`Error`] - shared error taxonomy
//!
//! ## Crate Structure
//!
//! This crate has no internal dependencies:
//!
//! ```text
//! blink-core (this crate)
//!    ^
//!    +-- blink-cache (slice store, RAM budget)
//!    +-- blink-cube (stack, contrast engine, tasks)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod format;
pub mod frame;
pub mod header;
pub mod plane;
pub mod wcs;

pub use error::{Error, Result};
pub use format::{BitDepth, PixelCoding};
pub use frame::{CacheFileId, CacheLocation, FrameBuffer, OriginalState};
pub use header::Header;
pub use plane::{HugePlane, ImagePlane, Plane, RgbPlane};
pub use wcs::Wcs;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::format::{BitDepth, PixelCoding};
    pub use crate::frame::{CacheFileId, CacheLocation, FrameBuffer};
    pub use crate::header::Header;
    pub use crate::plane::{ImagePlane, Plane};
    pub use crate::wcs::Wcs;
}
