//! # blink-cache
//!
//! Disk-backed storage of original slice pixels and RAM accounting.
//!
//! - [`CacheFiles`] - registry of cache files, one open handle per file
//! - [`ScratchFile`] - append-only spill file for RAM-only slices
//! - [`SliceStore`] - load/evict/spill of individual slices
//! - [`RamBudget`] - global byte budget with cooperative eviction across stacks
//! - [`memory`] - system memory detection and environment overrides
//!
//! # Cache File Format
//!
//! A cache file is a flat run of coded slice bytes. Offsets and lengths are
//! recorded in the frames, never in the file.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod budget;
pub mod files;
pub mod memory;
pub mod scratch;
pub mod store;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use budget::{BudgetReport, Evictable, RamBudget};
pub use files::CacheFiles;
pub use memory::{BudgetConfig, format_bytes};
pub use scratch::ScratchFile;
pub use store::{SliceStore, StoreStats};

/// Locks a mutex, recovering the data if a previous holder panicked.
#[inline]
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
