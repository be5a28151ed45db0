//! Axis permutation of a cube.
//!
//! A cube has three FITS axes; the stack always iterates frames along the
//! third one as it is currently laid out. A permutation swaps the first or
//! second axis with the third. Every state is reached from the natural layout
//! by at most one swap, so going from any state to any other is "undo the
//! current swap, apply the target swap", done here as a single mapping.
//!
//! Coordinates are FITS-ordered: `x` fastest, `y = 0` the bottom row.

use std::fmt;
use std::str::FromStr;

use blink_cache::RamBudget;
use blink_core::{Error, FrameBuffer, Header, OriginalState, Result, Wcs};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::stack::{MultiFrameStack, StackShared, StackState};
use crate::task::{Checkpoint, uninterrupted};

/// Which axis currently plays the role of depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisPermutation {
    /// Axes as delivered.
    #[default]
    Natural,
    /// Width and depth swapped.
    SwapWidthDepth,
    /// Height and depth swapped.
    SwapHeightDepth,
}

impl AxisPermutation {
    /// FITS axis (1 or 2) swapped with axis 3.
    pub fn swapped_axis(&self) -> Option<u8> {
        match self {
            Self::Natural => None,
            Self::SwapWidthDepth => Some(1),
            Self::SwapHeightDepth => Some(2),
        }
    }

    /// Maps a natural `(x, y, z)` triple into this layout. Self-inverse.
    #[inline]
    pub fn map<T>(&self, (x, y, z): (T, T, T)) -> (T, T, T) {
        match self {
            Self::Natural => (x, y, z),
            Self::SwapWidthDepth => (z, y, x),
            Self::SwapHeightDepth => (x, z, y),
        }
    }
}

impl fmt::Display for AxisPermutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Natural => "natural",
            Self::SwapWidthDepth => "width-depth",
            Self::SwapHeightDepth => "height-depth",
        })
    }
}

impl FromStr for AxisPermutation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "natural" | "none" | "0" => Ok(Self::Natural),
            "width-depth" | "wd" | "xz" | "1" => Ok(Self::SwapWidthDepth),
            "height-depth" | "hd" | "yz" | "2" => Ok(Self::SwapHeightDepth),
            other => Err(Error::other(format!("unknown axis permutation '{other}'"))),
        }
    }
}

/// Storage row order of the buffers being permuted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// Row 0 is the bottom row (coded pixels).
    BottomFirst,
    /// Row 0 is the top row (display pixels).
    TopFirst,
}

/// Precomputed geometry of one permutation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutePlan {
    /// Layout of the source slices.
    pub from: AxisPermutation,
    /// Requested layout.
    pub to: AxisPermutation,
    /// Source `(width, height, depth)`.
    pub src: (usize, usize, usize),
    /// Output `(width, height, depth)`.
    pub dst: (usize, usize, usize),
}

impl PermutePlan {
    /// Plans the move from `from` to `to` for a cube currently `src` in size.
    pub fn new(from: AxisPermutation, to: AxisPermutation, src: (usize, usize, usize)) -> Self {
        let natural = from.map(src);
        Self {
            from,
            to,
            src,
            dst: to.map(natural),
        }
    }

    /// Whether nothing moves.
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Bytes of one output slice.
    pub fn dst_slice_len(&self, bpp: usize) -> usize {
        self.dst.0 * self.dst.1 * bpp
    }

    /// Builds output slice `z` from the source slices.
    pub fn slice<S: AsRef<[u8]>>(&self, z: usize, sources: &[S], bpp: usize, order: RowOrder) -> Result<Vec<u8>> {
        let (sw, sh, _) = self.src;
        let (dw, dh, _) = self.dst;
        let mut out = alloc(self.dst_slice_len(bpp))?;
        for y in 0..dh {
            let dst_row = match order {
                RowOrder::BottomFirst => y,
                RowOrder::TopFirst => dh - 1 - y,
            };
            for x in 0..dw {
                let (cx, cy, cz) = self.from.map(self.to.map((x, y, z)));
                let src_row = match order {
                    RowOrder::BottomFirst => cy,
                    RowOrder::TopFirst => sh - 1 - cy,
                };
                let s = (src_row * sw + cx) * bpp;
                let d = (dst_row * dw + x) * bpp;
                out[d..d + bpp].copy_from_slice(&sources[cz].as_ref()[s..s + bpp]);
            }
        }
        Ok(out)
    }

    /// Renumbers calibration keywords and NAXISn for the new layout.
    pub fn rewrite_header(&self, header: &mut Header) {
        if let Some(axis) = self.from.swapped_axis() {
            header.swap_axes(axis, 3);
        }
        if let Some(axis) = self.to.swapped_axis() {
            header.swap_axes(axis, 3);
        }
        header.set("NAXIS1", self.dst.0.to_string());
        header.set("NAXIS2", self.dst.1.to_string());
        header.set("NAXIS3", self.dst.2.to_string());
    }
}

/// Zeroed buffer, reporting allocation failure instead of aborting.
pub(crate) fn alloc(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::out_of_memory(len as u64, 0))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// What a permutation did to the original pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermuteOutcome {
    /// Already in the requested layout.
    Unchanged,
    /// Display and original pixels were transposed.
    Permuted,
    /// Memory ran short: display pixels were transposed and the original
    /// pixels dropped for the rest of the session.
    Degraded,
}

/// Budget bytes held for the duration of a pass.
struct Reservation<'a> {
    budget: &'a RamBudget,
    bytes: u64,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.budget.release(self.bytes);
    }
}

impl StackShared {
    /// Physically transposes the cube into `target`.
    ///
    /// Original pixels need the source copy plus the output in the budget.
    /// When that cannot be had even after evicting this stack's own slices,
    /// the pass is retried once on display pixels only.
    pub(crate) fn permute_axes(&self, target: AxisPermutation, checkpoint: Checkpoint<'_>) -> Result<PermuteOutcome> {
        let (plan, bpp, displays, with_originals) = {
            let st = self.lock();
            let plan = PermutePlan::new(st.permutation, target, (st.width, st.height, st.depth()));
            if plan.is_identity() {
                return Ok(PermuteOutcome::Unchanged);
            }
            let displays: Vec<Vec<u8>> = st.frames.iter().map(|f| f.display().to_vec()).collect();
            let with_originals = !st.frames.is_empty()
                && st.frames.iter().all(|f| f.original_state() != OriginalState::Unavailable);
            (plan, st.coding.bytes_per_pixel(), displays, with_originals)
        };
        debug!(stack = self.id, from = %plan.from, to = %plan.to, src = ?plan.src, dst = ?plan.dst, "permuting");

        let mut originals = None;
        let mut degraded = None;
        if with_originals {
            match self.permute_originals(&plan, bpp, checkpoint) {
                Ok(out) => originals = Some(out),
                Err(e) if e.is_out_of_memory() => {
                    debug!(stack = self.id, error = %e, "retrying permutation on display pixels only");
                    degraded = Some("not enough memory to transpose original pixels".to_string());
                }
                Err(e) if e.is_cache_error() => {
                    debug!(stack = self.id, error = %e, "retrying permutation on display pixels only");
                    degraded = Some(format!("original pixels could not be read back ({e})"));
                }
                Err(e) => return Err(e),
            }
        }

        let mut permuted = Vec::with_capacity(plan.dst.2);
        for z in 0..plan.dst.2 {
            checkpoint()?;
            permuted.push(plan.slice(z, &displays, 1, RowOrder::TopFirst)?);
        }
        drop(displays);

        let calibration_lost = self.install_permutation(&plan, permuted, originals, degraded.is_some())?;
        if let Some(reason) = &degraded {
            self.warn_user(format!(
                "{}: {reason}; values are no longer available for this cube",
                self.label
            ));
        }
        if calibration_lost {
            self.warn_user(format!(
                "{}: astrometric calibration cannot be expressed in the {} layout and was removed",
                self.label, plan.to
            ));
        }
        let degraded = degraded.is_some();
        info!(stack = self.id, layout = %plan.to, dims = ?plan.dst, degraded, "permutation done");
        Ok(if degraded { PermuteOutcome::Degraded } else { PermuteOutcome::Permuted })
    }

    fn permute_originals(&self, plan: &PermutePlan, bpp: usize, checkpoint: Checkpoint<'_>) -> Result<Vec<Vec<u8>>> {
        let (w, h, d) = plan.src;
        let need = 2 * (w * h * d * bpp) as u64;
        if !self.budget.acquire(need, self.id) {
            let freed = {
                let mut st = self.lock();
                self.evict_everything(&mut st)
            };
            debug!(stack = self.id, freed, "evicted own slices for permutation");
            if !self.budget.acquire(need, self.id) {
                return Err(Error::out_of_memory(need, self.budget.available()));
            }
        }
        let _reservation = Reservation {
            budget: &self.budget,
            bytes: need,
        };

        let mut sources = Vec::with_capacity(d);
        for i in 0..d {
            checkpoint()?;
            let mut st = self.lock();
            if st.depth() != d {
                return Err(Error::other("stack changed during permutation"));
            }
            match st.coded_slice(i) {
                Ok(coded) => sources.push(coded.into_owned()),
                Err(e) => {
                    if e.is_cache_error() {
                        st.frames[i].set_cache(None);
                    }
                    return Err(e);
                }
            }
        }
        let mut out = Vec::with_capacity(plan.dst.2);
        for z in 0..plan.dst.2 {
            checkpoint()?;
            out.push(plan.slice(z, &sources, bpp, RowOrder::BottomFirst)?);
        }
        Ok(out)
    }

    /// Swaps the permuted frames in. Returns whether a calibration was lost.
    fn install_permutation(
        &self,
        plan: &PermutePlan,
        displays: Vec<Vec<u8>>,
        originals: Option<Vec<Vec<u8>>>,
        degraded: bool,
    ) -> Result<bool> {
        let mut st = self.lock();
        if st.permutation != plan.from || (st.width, st.height, st.depth()) != plan.src {
            return Err(Error::other("stack changed during permutation"));
        }
        if plan.from == AxisPermutation::Natural {
            st.natural_labels = st.frames.iter().map(|f| f.label().to_string()).collect();
        }

        let (w, h, d) = plan.dst;
        let restore_labels = plan.to == AxisPermutation::Natural && st.natural_labels.len() == d;
        let full = originals.is_some();
        let mut originals = originals.map(Vec::into_iter);
        let mut frames = Vec::with_capacity(d);
        for (z, display) in displays.into_iter().enumerate() {
            let label = if restore_labels {
                st.natural_labels[z].clone()
            } else {
                format!("{} [{} {}/{}]", self.label, plan.to, z + 1, d)
            };
            let mut frame = FrameBuffer::new(display, label);
            if let Some(original) = originals.as_mut().and_then(Iterator::next) {
                frame.set_original(original);
            }
            frames.push(frame);
        }

        let released = st.resident_bytes();
        st.frames = frames;
        self.budget.release(released);
        self.budget.force_reserve(st.resident_bytes());

        st.width = w;
        st.height = h;
        st.permutation = plan.to;
        st.active = st.active.min(d.saturating_sub(1));
        let slice_bytes = w * h * st.coding.bytes_per_pixel();
        st.store.set_slice_bytes(slice_bytes);
        st.degraded |= degraded;
        let lost = rebuild_calibration(&mut st);
        drop(st);

        if full {
            self.spill_resident();
        }
        Ok(lost)
    }
}

/// Derives header and calibration of the current layout from the natural
/// ones. Returns whether a calibration existed and could not be rebuilt.
fn rebuild_calibration(st: &mut StackState) -> bool {
    let had = st.wcs.is_some();
    let natural_dims = st.permutation.map((st.width, st.height, st.depth()));
    let mut header = st.natural_header.clone();
    PermutePlan::new(AxisPermutation::Natural, st.permutation, natural_dims).rewrite_header(&mut header);

    let mut lost = false;
    st.wcs = if st.permutation == AxisPermutation::Natural {
        st.natural_wcs.clone()
    } else {
        match Wcs::from_header(&header) {
            Ok(wcs) => Some(wcs),
            Err(e) => {
                if had {
                    debug!(error = %e, "calibration not valid after permutation");
                    header.clear_calibration();
                    lost = true;
                }
                None
            }
        }
    };
    st.header = header;
    lost
}

impl MultiFrameStack {
    /// Transposes the cube into `target` on the calling thread.
    pub fn permute_axes(&self, target: AxisPermutation) -> Result<PermuteOutcome> {
        self.shared().permute_axes(target, &uninterrupted)
    }
}
