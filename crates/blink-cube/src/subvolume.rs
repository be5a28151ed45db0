//! Voxel access in physical units.
//!
//! Coordinates use a top-left origin: `y = 0` is the top row as displayed.
//! The coded slices are bottom row first, so row `y` reads coded row
//! `height - 1 - y`.

use blink_core::{Error, OriginalState, Result};
use tracing::trace;

use crate::stack::MultiFrameStack;

/// A box of physical values, `x` fastest, then `y`, then `z`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubCube {
    /// Extent along x.
    pub width: usize,
    /// Extent along y.
    pub height: usize,
    /// Extent along z.
    pub depth: usize,
    /// `width * height * depth` values.
    pub values: Vec<f64>,
}

impl SubCube {
    /// Value at a position relative to the box origin.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f64> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        self.values.get((z * self.height + y) * self.width + x).copied()
    }
}

impl MultiFrameStack {
    /// Physical value of one voxel.
    pub fn pixel_value(&self, x: usize, y: usize, z: usize) -> Result<f64> {
        Ok(self.extract_subvolume(x, y, z, 1, 1, 1)?.values[0])
    }

    /// Physical values of a box of voxels.
    ///
    /// When every slice of the box fits in the memory budget the slices are
    /// loaded first; otherwise rows are streamed from the cache files
    /// without making the slices resident.
    pub fn extract_subvolume(&self, x: usize, y: usize, z: usize, w: usize, h: usize, d: usize) -> Result<SubCube> {
        let shared = self.shared();
        let (width, height, coding, missing) = {
            let st = shared.lock();
            let (width, height, depth) = (st.width, st.height, st.depth());
            let inside = w > 0
                && h > 0
                && d > 0
                && x.checked_add(w).is_some_and(|e| e <= width)
                && y.checked_add(h).is_some_and(|e| e <= height)
                && z.checked_add(d).is_some_and(|e| e <= depth);
            if !inside {
                return Err(Error::VoxelOutOfRange {
                    x,
                    y,
                    z,
                    w,
                    h,
                    d,
                    width,
                    height,
                    depth,
                });
            }
            let missing = st.frames[z..z + d]
                .iter()
                .filter(|f| f.original_state() == OriginalState::Cached)
                .count();
            (width, height, st.coding, (missing * st.store.slice_bytes()) as u64)
        };

        let preload = missing == 0 || self.can_load(missing);
        trace!(stack = shared.id, x, y, z, w, h, d, preload, "extract subvolume");

        let bpp = coding.bytes_per_pixel();
        let mut values = Vec::with_capacity(w * h * d);
        for k in z..z + d {
            if preload {
                shared.ensure_loaded(k)?;
            }
            let st = shared.lock();
            if (st.width, st.height) != (width, height) || k >= st.depth() {
                return Err(Error::other("stack geometry changed during extraction"));
            }
            let frame = &st.frames[k];
            for j in 0..h {
                let row = height - 1 - (y + j);
                let start = (row * width + x) * bpp;
                let span = match frame.original() {
                    Some(original) => original[start..start + w * bpp].to_vec(),
                    None => st.store.read_span(k, frame, start, w * bpp)?,
                };
                values.extend(span.chunks_exact(bpp).map(|px| coding.physical(px)));
            }
        }
        Ok(SubCube {
            width: w,
            height: h,
            depth: d,
            values,
        })
    }
}
