//! Per-stack slice loader.
//!
//! [`SliceStore`] moves the original pixels of individual [`FrameBuffer`]s
//! between RAM and their cache files. It does not own the frames; the stack
//! passes them in while holding its own lock, which keeps loads and evictions
//! of one stack mutually exclusive without a global lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use blink_core::{CacheLocation, Error, FrameBuffer, Result};
use tracing::{debug, trace};

use crate::files::CacheFiles;
use crate::scratch::ScratchFile;

/// Load/evict counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Slices read from cache files.
    pub loads: u64,
    /// Slices dropped from RAM.
    pub evictions: u64,
    /// Slices spilled to scratch.
    pub spills: u64,
}

/// Reads, evicts and spills slice bytes of one stack.
#[derive(Debug)]
pub struct SliceStore {
    files: Arc<CacheFiles>,
    slice_bytes: usize,
    loads: AtomicU64,
    evictions: AtomicU64,
    spills: AtomicU64,
}

impl SliceStore {
    /// Creates a store for slices of `slice_bytes` coded bytes each.
    pub fn new(files: Arc<CacheFiles>, slice_bytes: usize) -> Self {
        Self {
            files,
            slice_bytes,
            loads: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            spills: AtomicU64::new(0),
        }
    }

    /// Coded bytes per slice.
    #[inline]
    pub fn slice_bytes(&self) -> usize {
        self.slice_bytes
    }

    /// Updates the slice size after the stack geometry changed.
    pub fn set_slice_bytes(&mut self, slice_bytes: usize) {
        self.slice_bytes = slice_bytes;
    }

    /// Shared file pool.
    pub fn files(&self) -> &Arc<CacheFiles> {
        &self.files
    }

    /// Reads a slice from its cache file without installing it.
    pub fn read_cached(&self, index: usize, location: Option<CacheLocation>) -> Result<Vec<u8>> {
        let location = location.ok_or_else(|| Error::unavailable(index))?;
        trace!(frame = index, file = %location.file, offset = location.offset, "reading slice");
        self.files.read_vec(location, self.slice_bytes)
    }

    /// Makes the original bytes of `frame` resident.
    ///
    /// Returns the number of bytes that became resident (0 when they already
    /// were). The caller is responsible for budget accounting.
    pub fn load(&self, index: usize, frame: &mut FrameBuffer) -> Result<usize> {
        if frame.is_resident() {
            return Ok(0);
        }
        let bytes = self.read_cached(index, frame.cache())?;
        let n = bytes.len();
        frame.set_original(bytes);
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(n)
    }

    /// Drops the resident bytes of `frame`.
    ///
    /// Refused (returns 0) when the frame has no cache backing, since the
    /// bytes could not be reloaded.
    pub fn evict(&self, index: usize, frame: &mut FrameBuffer) -> usize {
        if !frame.is_evictable() {
            if frame.is_resident() {
                trace!(frame = index, "eviction refused, no cache backing");
            }
            return 0;
        }
        let freed = frame.take_original().map_or(0, |v| v.len());
        self.evictions.fetch_add(1, Ordering::Relaxed);
        trace!(frame = index, bytes = freed, "evicted slice");
        freed
    }

    /// Reads `len` coded bytes starting `start` bytes into the slice, from RAM
    /// when resident, otherwise straight from the cache file.
    pub fn read_span(&self, index: usize, frame: &FrameBuffer, start: usize, len: usize) -> Result<Vec<u8>> {
        if start + len > self.slice_bytes {
            return Err(Error::OutOfRange {
                what: "slice byte",
                index: start + len,
                limit: self.slice_bytes,
            });
        }
        if let Some(original) = frame.original() {
            return Ok(original[start..start + len].to_vec());
        }
        let location = frame.cache().ok_or_else(|| Error::unavailable(index))?;
        let at = CacheLocation::new(location.file, location.offset + start as u64);
        self.files.read_vec(at, len)
    }

    /// Writes resident-only original bytes to `scratch`, making the frame
    /// evictable. Returns `false` when there was nothing to spill.
    pub fn spill(&self, index: usize, frame: &mut FrameBuffer, scratch: &ScratchFile) -> Result<bool> {
        if frame.cache().is_some() {
            return Ok(false);
        }
        let Some(original) = frame.original() else {
            return Ok(false);
        };
        let location = scratch.append(original)?;
        frame.set_cache(Some(location));
        self.spills.fetch_add(1, Ordering::Relaxed);
        debug!(frame = index, offset = location.offset, "spilled slice to scratch");
        Ok(true)
    }

    /// Snapshot of counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            loads: self.loads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            spills: self.spills.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn setup() -> (tempfile::NamedTempFile, Arc<CacheFiles>, Vec<FrameBuffer>) {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..24).collect();
        tmp.write_all(&data).unwrap();
        let files = Arc::new(CacheFiles::new());
        let id = files.register(tmp.path());
        let frames = (0..3)
            .map(|i| FrameBuffer::cached(4, CacheLocation::new(id, i * 8), format!("f{i}")))
            .collect();
        (tmp, files, frames)
    }

    #[test]
    fn evict_reload_round_trip() {
        let (_tmp, files, mut frames) = setup();
        let store = SliceStore::new(files, 8);

        assert_eq!(store.load(1, &mut frames[1]).unwrap(), 8);
        let first = frames[1].original().unwrap().to_vec();
        assert_eq!(store.load(1, &mut frames[1]).unwrap(), 0);

        assert_eq!(store.evict(1, &mut frames[1]), 8);
        assert!(!frames[1].is_resident());
        store.load(1, &mut frames[1]).unwrap();
        assert_eq!(frames[1].original().unwrap(), first.as_slice());
        assert_eq!(first, (8..16).collect::<Vec<u8>>());

        let stats = store.stats();
        assert_eq!((stats.loads, stats.evictions), (2, 1));
    }

    #[test]
    fn refuses_irreversible_eviction() {
        let store = SliceStore::new(Arc::new(CacheFiles::new()), 2);
        let mut frame = FrameBuffer::new(vec![0; 1], "mem").with_original(vec![1, 2]);
        assert_eq!(store.evict(0, &mut frame), 0);
        assert!(frame.is_resident());
    }

    #[test]
    fn span_reads_from_file_when_not_resident() {
        let (_tmp, files, frames) = setup();
        let store = SliceStore::new(files, 8);
        assert_eq!(store.read_span(2, &frames[2], 2, 3).unwrap(), vec![18, 19, 20]);
        assert!(store.read_span(2, &frames[2], 6, 3).unwrap_err().is_bounds_error());
    }

    #[test]
    fn unavailable_without_backing() {
        let store = SliceStore::new(Arc::new(CacheFiles::new()), 2);
        let mut frame = FrameBuffer::new(vec![0; 1], "gone");
        assert!(store.load(4, &mut frame).unwrap_err().is_unavailable());
    }

    #[test]
    fn spill_makes_evictable() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(CacheFiles::new());
        let scratch = ScratchFile::create_in(dir.path(), &files).unwrap();
        let store = SliceStore::new(files, 2);

        let mut frame = FrameBuffer::new(vec![0; 1], "mem").with_original(vec![7, 9]);
        assert!(store.spill(0, &mut frame, &scratch).unwrap());
        assert!(!store.spill(0, &mut frame, &scratch).unwrap());
        assert!(frame.is_evictable());

        store.evict(0, &mut frame);
        store.load(0, &mut frame).unwrap();
        assert_eq!(frame.original().unwrap(), &[7, 9]);
    }
}
