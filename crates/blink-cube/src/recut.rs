//! Recomputing display pixels from original pixels.

use blink_core::{Error, Result};
use tracing::{debug, info};

use crate::stack::{MultiFrameStack, StackShared};
use crate::task::{Checkpoint, uninterrupted};

/// Outcome of a stack-wide recut.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecutSummary {
    /// Frames whose display pixels were recomputed.
    pub recut: usize,
    /// Frames without original pixels, left as they were.
    pub skipped: usize,
    /// Frames whose cache could not be read, left as they were.
    pub failed: usize,
    /// Window applied.
    pub cuts: (f64, f64),
}

impl StackShared {
    /// Recomputes one frame and stores the window in the contrast state.
    pub(crate) fn recut_frame(&self, index: usize, min: f64, max: f64, autocut: bool) -> Result<Vec<u8>> {
        let mut st = self.lock();
        st.check_frame(index)?;
        let coded = match st.coded_slice(index) {
            Ok(coded) => coded.into_owned(),
            Err(e) => {
                if e.is_cache_error() {
                    st.frames[index].set_cache(None);
                }
                return Err(e);
            }
        };
        let (lo, hi) = self.engine.resolve_cuts(&coded, &st.coding, min, max, autocut);
        st.contrast.set_cuts(lo, hi);
        let display = self.engine.remap(&coded, &st.coding, st.width, st.height, &st.contrast);
        st.frames[index].set_display(display.clone());
        debug!(stack = self.id, frame = index, cut_min = lo, cut_max = hi, "recut frame");
        Ok(display)
    }

    /// Recomputes every frame with one window.
    ///
    /// The window (and the equalization table, for histogram equalization)
    /// comes from the first frame with readable original pixels, so all
    /// frames share the same mapping. Frames that cannot be read keep their
    /// display pixels; one warning covers all of them.
    pub(crate) fn recut_stack(&self, min: f64, max: f64, autocut: bool, checkpoint: Checkpoint<'_>) -> Result<RecutSummary> {
        let (state, eq, coding, width, height, depth) = {
            let mut st = self.lock();
            let depth = st.depth();
            let reference = (0..depth).find_map(|i| st.coded_slice(i).ok().map(|c| c.into_owned()));
            let (lo, hi, eq) = match &reference {
                Some(coded) => {
                    let (lo, hi) = self.engine.resolve_cuts(coded, &st.coding, min, max, autocut);
                    st.contrast.set_cuts(lo, hi);
                    (lo, hi, self.engine.equalizer(coded, &st.coding, &st.contrast))
                }
                None => {
                    st.contrast.set_cuts(min, max);
                    (min, max, None)
                }
            };
            debug!(stack = self.id, cut_min = lo, cut_max = hi, depth, "recut stack");
            (st.contrast.clone(), eq, st.coding, st.width, st.height, depth)
        };

        let mut summary = RecutSummary {
            cuts: (state.cut_min, state.cut_max),
            ..RecutSummary::default()
        };
        for i in 0..depth {
            checkpoint()?;
            let mut st = self.lock();
            if st.width != width || st.height != height || i >= st.depth() {
                return Err(Error::other("stack geometry changed during recut"));
            }
            let coded = match st.coded_slice(i) {
                Ok(coded) => coded.into_owned(),
                Err(e) if e.is_unavailable() => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) if e.is_cache_error() => {
                    debug!(stack = self.id, frame = i, error = %e, "cache read failed during recut");
                    st.frames[i].set_cache(None);
                    summary.failed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let display = self.engine.remap_with(&coded, &coding, width, height, &state, eq.as_ref());
            st.frames[i].set_display(display);
            summary.recut += 1;
        }

        if summary.failed > 0 {
            self.warn_user(format!(
                "{}: {} of {depth} frames could not be read from cache and kept their previous display",
                self.label, summary.failed
            ));
        }
        info!(stack = self.id, recut = summary.recut, skipped = summary.skipped, failed = summary.failed, "stack recut done");
        Ok(summary)
    }
}

impl MultiFrameStack {
    /// Recomputes the display pixels of one frame and returns them.
    ///
    /// With `autocut` the window is computed from the frame, otherwise
    /// `min..max` is used. The window becomes the stack's contrast state.
    pub fn recut_frame(&self, index: usize, min: f64, max: f64, autocut: bool) -> Result<Vec<u8>> {
        self.shared().recut_frame(index, min, max, autocut)
    }

    /// Recomputes every frame with one window, on the calling thread.
    pub fn recut_stack(&self, min: f64, max: f64, autocut: bool) -> Result<RecutSummary> {
        self.shared().recut_stack(min, max, autocut, &uninterrupted)
    }
}
