//! Append-only scratch cache file.
//!
//! Frames built from in-memory planes have no disk copy of their original
//! pixels. Spilling them here gives them a `(file, offset)` so they can be
//! evicted and reloaded like file-backed slices. The file is removed when the
//! [`ScratchFile`] is dropped.

use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use blink_core::{CacheFileId, CacheLocation, Error, Result};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::files::CacheFiles;
use crate::lock;

/// Scratch file registered in a [`CacheFiles`] pool.
#[derive(Debug)]
pub struct ScratchFile {
    id: CacheFileId,
    file: Mutex<NamedTempFile>,
}

impl ScratchFile {
    /// Creates a scratch file in `dir` and registers it with `files`.
    pub fn create_in(dir: impl AsRef<Path>, files: &CacheFiles) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("blink-")
            .suffix(".cache")
            .tempfile_in(dir)?;
        let id = files.register(file.path());
        debug!(file = %id, path = %file.path().display(), "created scratch cache");
        Ok(Self {
            id,
            file: Mutex::new(file),
        })
    }

    /// Id in the owning pool.
    pub fn id(&self) -> CacheFileId {
        self.id
    }

    /// Appends bytes and returns where they landed.
    pub fn append(&self, bytes: &[u8]) -> Result<CacheLocation> {
        let mut file = lock(&self.file);
        let path = file.path().to_path_buf();
        let offset = file
            .as_file_mut()
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::cache_io(&path, 0, e))?;
        file.as_file_mut()
            .write_all(bytes)
            .and_then(|_| file.as_file_mut().flush())
            .map_err(|e| Error::cache_io(&path, offset, e))?;
        Ok(CacheLocation::new(self.id, offset))
    }

    /// Current size in bytes.
    pub fn len(&self) -> u64 {
        lock(&self.file)
            .as_file()
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
