//! Pool of cache file handles.
//!
//! Slices name their backing file by [`CacheFileId`]. The pool maps ids to
//! paths and opens each file at most once, however many slices read from it,
//! so sweeping a deep stack does not open one descriptor per slice.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use blink_core::{CacheFileId, CacheLocation, Error, Result};
use tracing::{debug, trace};

use crate::lock;

struct Entry {
    path: PathBuf,
    handle: Option<Arc<File>>,
}

#[derive(Default)]
struct Inner {
    next_id: u32,
    entries: HashMap<CacheFileId, Entry>,
    opens: u64,
}

/// Registry of cache files with coalesced read handles.
#[derive(Default)]
pub struct CacheFiles {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for CacheFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("CacheFiles")
            .field("files", &inner.entries.len())
            .field("opens", &inner.opens)
            .finish()
    }
}

impl CacheFiles {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file and returns its id. Registering the same path twice
    /// returns the existing id.
    pub fn register(&self, path: impl AsRef<Path>) -> CacheFileId {
        let path = path.as_ref();
        let mut inner = lock(&self.inner);
        if let Some((id, _)) = inner.entries.iter().find(|(_, e)| e.path == path) {
            return *id;
        }
        let id = CacheFileId(inner.next_id);
        inner.next_id += 1;
        inner.entries.insert(
            id,
            Entry {
                path: path.to_path_buf(),
                handle: None,
            },
        );
        debug!(file = %id, path = %path.display(), "registered cache file");
        id
    }

    /// Path of a registered file.
    pub fn path(&self, id: CacheFileId) -> Option<PathBuf> {
        lock(&self.inner).entries.get(&id).map(|e| e.path.clone())
    }

    /// Opens the file lazily, reusing the existing handle.
    fn handle(&self, id: CacheFileId, offset: u64) -> Result<(PathBuf, Arc<File>)> {
        let mut inner = lock(&self.inner);
        let Inner { entries, opens, .. } = &mut *inner;
        let entry = entries.get_mut(&id).ok_or_else(|| {
            Error::cache_io(
                format!("<{id}>"),
                offset,
                std::io::Error::new(std::io::ErrorKind::NotFound, "unregistered cache file"),
            )
        })?;

        if let Some(h) = &entry.handle {
            return Ok((entry.path.clone(), Arc::clone(h)));
        }

        let file = File::open(&entry.path).map_err(|e| Error::cache_io(&entry.path, offset, e))?;
        let handle = Arc::new(file);
        entry.handle = Some(Arc::clone(&handle));
        *opens += 1;
        trace!(file = %id, "opened cache file handle");
        Ok((entry.path.clone(), handle))
    }

    /// Reads exactly `buf.len()` bytes at `location`.
    ///
    /// Reads are positional, so concurrent readers share one handle
    /// without serializing on a file cursor.
    pub fn read_at(&self, location: CacheLocation, buf: &mut [u8]) -> Result<()> {
        let (path, handle) = self.handle(location.file, location.offset)?;
        read_exact_at(&handle, buf, location.offset).map_err(|e| Error::cache_io(path, location.offset, e))
    }

    /// Reads `len` bytes at `location` into a new buffer.
    pub fn read_vec(&self, location: CacheLocation, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(location, &mut buf)?;
        Ok(buf)
    }

    /// Closes the handle of one file; the registration stays.
    pub fn close(&self, id: CacheFileId) {
        if let Some(entry) = lock(&self.inner).entries.get_mut(&id) {
            entry.handle = None;
        }
    }

    /// Closes every open handle.
    pub fn close_all(&self) {
        let mut inner = lock(&self.inner);
        let open = inner.entries.values().filter(|e| e.handle.is_some()).count();
        for entry in inner.entries.values_mut() {
            entry.handle = None;
        }
        debug!(open, "closed cache file handles");
    }

    /// Forgets a file entirely.
    pub fn unregister(&self, id: CacheFileId) {
        lock(&self.inner).entries.remove(&id);
    }

    /// Number of currently open handles.
    pub fn open_handles(&self) -> usize {
        lock(&self.inner).entries.values().filter(|e| e.handle.is_some()).count()
    }

    /// Total number of `open` calls issued so far.
    pub fn total_opens(&self) -> u64 {
        lock(&self.inner).opens
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    std::os::unix::fs::FileExt::read_exact_at(file, buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "failed to fill whole buffer")),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
