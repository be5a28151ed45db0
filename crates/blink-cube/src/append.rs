//! Adding planes to a stack.
//!
//! A plane whose grid matches the stack (same size, same calibration) is
//! copied as is. Otherwise, when both sides are calibrated, it is resampled
//! onto the stack's projection by nearest pixel. Anything else must have the
//! stack's size.

use std::collections::VecDeque;

use blink_core::{Error, FrameBuffer, ImagePlane, PixelCoding, Result, Wcs};
use tracing::{debug, trace};

use crate::permute::AxisPermutation;
use crate::resample::{Grid, apply_coded, apply_display, nearest_map, recode_slice};
use crate::stack::{MultiFrameStack, StackShared};
use crate::task::{Checkpoint, uninterrupted};

impl StackShared {
    /// Appends queued planes one by one. Planes not yet taken stay in
    /// `queue` when the pass is interrupted.
    pub(crate) fn append_planes(&self, queue: &mut VecDeque<ImagePlane>, checkpoint: Checkpoint<'_>) -> Result<usize> {
        let mut appended = 0;
        while !queue.is_empty() {
            checkpoint()?;
            let (width, height, wcs, coding, keep_original) = {
                let st = self.lock();
                if st.permutation != AxisPermutation::Natural {
                    return Err(Error::other(format!(
                        "cannot append frames while the cube is in the {} layout",
                        st.permutation
                    )));
                }
                (st.width, st.height, st.wcs.clone(), st.coding, !st.degraded)
            };
            let Some(plane) = queue.pop_front() else {
                break;
            };
            let frame = conform(plane, width, height, wcs.as_ref(), &coding, keep_original)?;

            let mut st = self.lock();
            if (st.width, st.height) != (width, height) {
                return Err(Error::other("stack geometry changed during append"));
            }
            self.budget.force_reserve(frame.resident_bytes() as u64);
            trace!(stack = self.id, frame = st.depth(), label = frame.label(), "appended frame");
            st.frames.push(frame);
            appended += 1;
        }
        if appended > 0 {
            self.spill_resident();
            debug!(stack = self.id, appended, "frames appended");
        }
        Ok(appended)
    }
}

/// Brings a plane onto the stack's grid and encoding.
pub(crate) fn conform(
    plane: ImagePlane,
    width: usize,
    height: usize,
    wcs: Option<&Wcs>,
    coding: &PixelCoding,
    keep_original: bool,
) -> Result<FrameBuffer> {
    plane.validate()?;
    let reference = Grid::new(width, height, wcs);
    let source = Grid::new(plane.width, plane.height, plane.wcs.as_ref());
    let src_coding = plane.coding.unwrap_or(*coding);
    let same_size = plane.width == width && plane.height == height;

    let (display, original) = if reference.same_as(&source) || (same_size && (wcs.is_none() || plane.wcs.is_none())) {
        let original = plane.original.map(|o| {
            if src_coding.same_encoding(coding) {
                o
            } else {
                recode_slice(&o, &src_coding, coding)
            }
        });
        (plane.display, original)
    } else if let Some(map) = nearest_map(&reference, &source) {
        trace!(label = %plane.label, "resampling onto stack projection");
        let display = apply_display(&map, &reference, &source, &plane.display);
        let original = plane.original.as_deref().map(|o| apply_coded(&map, o, &src_coding, coding));
        (display, original)
    } else {
        return Err(Error::dimension_mismatch((width, height), (plane.width, plane.height)));
    };

    let mut frame = FrameBuffer::new(display, plane.label);
    if keep_original && let Some(original) = original {
        frame.set_original(original);
    }
    Ok(frame)
}

impl MultiFrameStack {
    /// Appends planes on the calling thread. Returns the number appended.
    pub fn append_frames(&self, planes: Vec<ImagePlane>) -> Result<usize> {
        let mut queue = VecDeque::from(planes);
        self.shared().append_planes(&mut queue, &uninterrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blink_core::BitDepth;

    fn wcs(crpix: (f64, f64)) -> Wcs {
        Wcs::new(crpix, (10.0, 20.0), [[-1.0 / 3600.0, 0.0], [0.0, 1.0 / 3600.0]])
    }

    #[test]
    fn same_grid_is_copied() {
        let w = wcs((1.0, 1.0));
        let coding = PixelCoding::new(BitDepth::I16);
        let plane = ImagePlane::from_display(2, 1, vec![3, 4], "p")
            .with_original(BitDepth::I16.encode_all(&[30.0, 40.0]), coding)
            .unwrap()
            .with_wcs(w.clone());
        let frame = conform(plane, 2, 1, Some(&w), &coding, true).unwrap();
        assert_eq!(frame.display(), &[3, 4]);
        assert_eq!(frame.original().unwrap(), BitDepth::I16.encode_all(&[30.0, 40.0]).as_slice());
        assert_eq!(frame.label(), "p");
    }

    #[test]
    fn uncalibrated_size_mismatch_is_rejected() {
        let coding = PixelCoding::new(BitDepth::U8);
        let plane = ImagePlane::from_display(3, 1, vec![0; 3], "p");
        let err = conform(plane, 2, 1, None, &coding, true).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn short_display_is_rejected() {
        let coding = PixelCoding::new(BitDepth::U8);
        let plane = ImagePlane::from_display(2, 2, vec![1, 2, 3], "bad");
        let err = conform(plane, 2, 2, None, &coding, true).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn shifted_plane_is_resampled() {
        let stack_wcs = wcs((1.0, 1.0));
        let plane = ImagePlane::from_display(3, 1, vec![10, 20, 30], "p").with_wcs(wcs((2.0, 1.0)));
        let frame = conform(plane, 3, 1, Some(&stack_wcs), &PixelCoding::new(BitDepth::U8), true).unwrap();
        assert_eq!(frame.display(), &[20, 30, 0]);
        assert!(frame.original().is_none());
    }

    #[test]
    fn originals_are_recoded_and_dropped_when_degraded() {
        let stack = PixelCoding::new(BitDepth::F32);
        let plane = ImagePlane::from_display(1, 1, vec![9], "p")
            .with_original(vec![200], PixelCoding::new(BitDepth::U8))
            .unwrap();
        let frame = conform(plane.clone(), 1, 1, None, &stack, true).unwrap();
        assert_eq!(BitDepth::F32.decode(frame.original().unwrap()), 200.0);
        let frame = conform(plane, 1, 1, None, &stack, false).unwrap();
        assert!(frame.original().is_none());
    }
}
