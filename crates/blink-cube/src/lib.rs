//! # blink-cube
//!
//! Multi-frame image stacks for blinking and cube browsing.
//!
//! A [`MultiFrameStack`] holds same-sized frames. Every frame always has
//! 8-bit display pixels; its original coded pixels are loaded from cache
//! files on demand and evicted under a shared [`RamBudget`](blink_cache::RamBudget).
//!
//! # Components
//!
//! | Type | Role |
//! |------|------|
//! | [`BlinkRegistry`] | Owns budget, cache files and counters; builds stacks |
//! | [`MultiFrameStack`] | Frames, activation, residency, voxel access |
//! | [`ContrastEngine`] | Coded to display remapping under a [`ContrastState`] |
//! | [`AutocutStrategy`] | Pluggable cut level estimation |
//! | [`PermutePlan`] | Axis transposition geometry and header rewrite |
//! | [`TaskController`] | One cancellable, restartable worker per stack |
//!
//! # Example
//!
//! ```rust
//! use blink_cache::BudgetConfig;
//! use blink_core::{BitDepth, ImagePlane, PixelCoding};
//! use blink_cube::{BlinkRegistry, RegistryConfig};
//!
//! let registry = BlinkRegistry::new(RegistryConfig::with_budget(BudgetConfig::with_limit(1 << 20)))?;
//! let coding = PixelCoding::new(BitDepth::I16);
//! let planes = (0..3)
//!     .map(|i| {
//!         let values = vec![1000.0 * (i + 1) as f64; 4];
//!         ImagePlane::from_display(2, 2, vec![0; 4], format!("frame {i}"))
//!             .with_original(BitDepth::I16.encode_all(&values), coding)
//!     })
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let stack = registry.stack_from_images(planes, None)?;
//! stack.recut_stack(1000.0, 3000.0, false)?;
//! assert_eq!(stack.display_pixels(2)?, vec![255; 4]);
//! assert_eq!(stack.pixel_value(0, 0, 1)?, 2000.0);
//! # Ok::<(), blink_core::Error>(())
//! ```
//!
//! # Threading
//!
//! Bulk operations ([`TaskRequest`]) run on the stack's worker thread and
//! report through [`StackEvent`]s. The synchronous variants
//! ([`MultiFrameStack::recut_stack`], [`MultiFrameStack::permute_axes`],
//! [`MultiFrameStack::append_frames`]) run the same code on the caller's
//! thread.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod autocut;
pub mod contrast;
pub mod events;
pub mod permute;
pub mod resample;
pub mod subvolume;
pub mod task;

mod append;
mod recut;
mod registry;
mod stack;

pub use autocut::{AutocutStrategy, MinMaxAutocut, PercentileAutocut};
pub use contrast::{ContrastEngine, ContrastState};
pub use events::{StackEvent, TaskKind};
pub use permute::{AxisPermutation, PermuteOutcome, PermutePlan};
pub use recut::RecutSummary;
pub use registry::{BlinkRegistry, CubeSource, RegistryConfig};
pub use stack::{MultiFrameStack, PlaybackMode, StackStats};
pub use subvolume::SubCube;
pub use task::{TaskController, TaskRequest, TaskState};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::contrast::{ContrastEngine, ContrastState};
    pub use crate::events::{StackEvent, TaskKind};
    pub use crate::permute::AxisPermutation;
    pub use crate::registry::{BlinkRegistry, CubeSource, RegistryConfig};
    pub use crate::stack::{MultiFrameStack, PlaybackMode};
    pub use crate::task::TaskRequest;
}
