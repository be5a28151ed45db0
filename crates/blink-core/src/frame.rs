//! A single 2D slice of a multi-frame stack.
//!
//! A [`FrameBuffer`] always owns its 8-bit display pixels. Its original
//! (coded) pixels are either resident, reloadable from a cache file, or
//! permanently gone.
//!
//! # Row order
//!
//! - display pixels: row 0 is the **top** row
//! - original pixels: row 0 is the **bottom** row (FITS order)

use serde::{Deserialize, Serialize};

/// Identifier of a cache file registered in a cache-file pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheFileId(pub u32);

impl std::fmt::Display for CacheFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cache#{}", self.0)
    }
}

/// Where a frame's original bytes can be re-read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheLocation {
    /// Cache file holding the bytes.
    pub file: CacheFileId,
    /// Byte offset of the first coded pixel.
    pub offset: u64,
}

impl CacheLocation {
    /// Creates a location.
    pub fn new(file: CacheFileId, offset: u64) -> Self {
        Self { file, offset }
    }
}

/// Residency of the original pixels of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginalState {
    /// In RAM.
    Resident,
    /// Evicted, reloadable from the cache.
    Cached,
    /// Never had originals, or lost them without cache backing.
    Unavailable,
}

/// One 2D slice: display pixels, optional original pixels and cache backing.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    display: Vec<u8>,
    original: Option<Vec<u8>>,
    cache: Option<CacheLocation>,
    label: String,
}

impl FrameBuffer {
    /// Creates a frame from display pixels only.
    pub fn new(display: Vec<u8>, label: impl Into<String>) -> Self {
        Self {
            display,
            original: None,
            cache: None,
            label: label.into(),
        }
    }

    /// Creates a frame whose originals live in a cache file and are not loaded yet.
    pub fn cached(pixel_count: usize, location: CacheLocation, label: impl Into<String>) -> Self {
        Self {
            display: vec![0; pixel_count],
            original: None,
            cache: Some(location),
            label: label.into(),
        }
    }

    /// Attaches resident original pixels.
    pub fn with_original(mut self, original: Vec<u8>) -> Self {
        self.original = Some(original);
        self
    }

    /// Attaches cache backing.
    pub fn with_cache(mut self, location: CacheLocation) -> Self {
        self.cache = Some(location);
        self
    }

    /// Display pixels, top row first.
    #[inline]
    pub fn display(&self) -> &[u8] {
        &self.display
    }

    /// Mutable display pixels.
    #[inline]
    pub fn display_mut(&mut self) -> &mut [u8] {
        &mut self.display
    }

    /// Replaces the display pixels.
    pub fn set_display(&mut self, display: Vec<u8>) {
        self.display = display;
    }

    /// Resident original bytes, bottom row first.
    #[inline]
    pub fn original(&self) -> Option<&[u8]> {
        self.original.as_deref()
    }

    /// Installs resident original bytes.
    pub fn set_original(&mut self, original: Vec<u8>) {
        self.original = Some(original);
    }

    /// Removes and returns the resident original bytes.
    pub fn take_original(&mut self) -> Option<Vec<u8>> {
        self.original.take()
    }

    /// Cache backing, if any.
    #[inline]
    pub fn cache(&self) -> Option<CacheLocation> {
        self.cache
    }

    /// Sets or clears the cache backing.
    pub fn set_cache(&mut self, location: Option<CacheLocation>) {
        self.cache = location;
    }

    /// Provenance label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Renames the frame.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Residency of the original pixels.
    pub fn original_state(&self) -> OriginalState {
        match (&self.original, &self.cache) {
            (Some(_), _) => OriginalState::Resident,
            (None, Some(_)) => OriginalState::Cached,
            (None, None) => OriginalState::Unavailable,
        }
    }

    /// Whether original bytes are in RAM.
    #[inline]
    pub fn is_resident(&self) -> bool {
        self.original.is_some()
    }

    /// Whether dropping the resident bytes is reversible.
    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.original.is_some() && self.cache.is_some()
    }

    /// Bytes of original data held in RAM.
    #[inline]
    pub fn resident_bytes(&self) -> usize {
        self.original.as_ref().map_or(0, Vec::len)
    }

    /// Drops originals and cache backing; the frame keeps display pixels only.
    pub fn forget_original(&mut self) -> usize {
        self.cache = None;
        self.take_original().map_or(0, |v| v.len())
    }
}
