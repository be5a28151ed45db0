//! Error types for stack, cache and contrast operations.
//!
//! Every crate in the workspace reports pixel-lifecycle failures through the
//! single [`Error`] enum defined here, so the UI layer can classify a failure
//! without knowing which component raised it.
//!
//! # Categories
//!
//! - **Cache**: [`CacheIo`](Error::CacheIo) - cache file missing, unreadable or short
//! - **Bounds**: [`OutOfRange`](Error::OutOfRange), [`VoxelOutOfRange`](Error::VoxelOutOfRange)
//! - **Availability**: [`OriginalPixelsUnavailable`](Error::OriginalPixelsUnavailable)
//! - **Memory**: [`OutOfMemory`](Error::OutOfMemory)
//! - **Calibration**: [`BadCalibration`](Error::BadCalibration)
//!
//! # Usage
//!
//! ```rust
//! use blink_core::{Error, Result};
//!
//! fn frame(index: usize, depth: usize) -> Result<usize> {
//!     if index >= depth {
//!         return Err(Error::frame_out_of_range(index, depth));
//!     }
//!     Ok(index)
//! }
//! assert!(frame(3, 3).unwrap_err().is_bounds_error());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the blink/cube core.
#[derive(Debug, Error)]
pub enum Error {
    /// Cache file missing, unreadable, or shorter than the recorded slice.
    #[error("cache I/O error on {path} at offset {offset}: {source}")]
    CacheIo {
        /// Cache file path.
        path: PathBuf,
        /// Byte offset of the slice.
        offset: u64,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Frame (or other indexed item) outside bounds.
    #[error("{what} index {index} out of range (limit {limit})")]
    OutOfRange {
        /// What was indexed.
        what: &'static str,
        /// Requested index.
        index: usize,
        /// Exclusive upper bound.
        limit: usize,
    },

    /// Voxel region outside the cube.
    #[error("voxel region ({x}, {y}, {z}) {w}x{h}x{d} exceeds cube {width}x{height}x{depth}")]
    VoxelOutOfRange {
        /// Region origin x.
        x: usize,
        /// Region origin y.
        y: usize,
        /// Region origin z.
        z: usize,
        /// Region width.
        w: usize,
        /// Region height.
        h: usize,
        /// Region depth.
        d: usize,
        /// Cube width.
        width: usize,
        /// Cube height.
        height: usize,
        /// Cube depth.
        depth: usize,
    },

    /// Original pixels were never cached and are not resident.
    #[error("original pixels of frame {frame} are not available")]
    OriginalPixelsUnavailable {
        /// Frame index.
        frame: usize,
    },

    /// A bulk operation could not fit in the memory budget even after eviction.
    #[error("out of memory: {requested} bytes requested, {available} available")]
    OutOfMemory {
        /// Bytes requested.
        requested: u64,
        /// Bytes available under the budget.
        available: u64,
    },

    /// Astrometric calibration could not be rebuilt.
    #[error("bad calibration: {0}")]
    BadCalibration(String),

    /// Incoming plane does not fit the stack geometry.
    #[error("dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        /// Stack width.
        a_width: usize,
        /// Stack height.
        a_height: usize,
        /// Plane width.
        b_width: usize,
        /// Plane height.
        b_height: usize,
    },

    /// Plane variant cannot take part in the requested operation.
    #[error("unsupported plane: {0}")]
    UnsupportedPlane(String),

    /// Unknown BITPIX code.
    #[error("unsupported BITPIX {0}")]
    UnsupportedBitDepth(i32),

    /// Operation observed a cancellation request.
    #[error("task cancelled")]
    TaskCancelled,

    /// Generic I/O error outside cache reads.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::CacheIo`].
    #[inline]
    pub fn cache_io(path: impl Into<PathBuf>, offset: u64, source: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            offset,
            source,
        }
    }

    /// Creates an [`Error::OutOfRange`] for a frame index.
    #[inline]
    pub fn frame_out_of_range(index: usize, depth: usize) -> Self {
        Self::OutOfRange {
            what: "frame",
            index,
            limit: depth,
        }
    }

    /// Creates an [`Error::OriginalPixelsUnavailable`].
    #[inline]
    pub fn unavailable(frame: usize) -> Self {
        Self::OriginalPixelsUnavailable { frame }
    }

    /// Creates an [`Error::OutOfMemory`].
    #[inline]
    pub fn out_of_memory(requested: u64, available: u64) -> Self {
        Self::OutOfMemory {
            requested,
            available,
        }
    }

    /// Creates an [`Error::DimensionMismatch`].
    #[inline]
    pub fn dimension_mismatch(a: (usize, usize), b: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            a_width: a.0,
            a_height: a.1,
            b_width: b.0,
            b_height: b.1,
        }
    }

    /// Creates an [`Error::Other`].
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` for out-of-bounds errors.
    #[inline]
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::OutOfRange { .. } | Self::VoxelOutOfRange { .. })
    }

    /// Returns `true` for cache read failures.
    #[inline]
    pub fn is_cache_error(&self) -> bool {
        matches!(self, Self::CacheIo { .. })
    }

    /// Returns `true` when original pixels cannot be produced.
    #[inline]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::OriginalPixelsUnavailable { .. })
    }

    /// Returns `true` for memory exhaustion.
    #[inline]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}
