//! The multi-frame stack.
//!
//! [`MultiFrameStack`] is the handle the view layer holds. Its state lives in
//! a [`StackShared`] behind one per-stack mutex, shared with the background
//! worker and registered with the RAM budget for cooperative eviction.
//!
//! # Locking
//!
//! - every mutation of frames, geometry or the active index happens under
//!   the stack's own mutex
//! - the mutex is never held while calling into the [`RamBudget`] sweep, so
//!   two stacks evicting each other cannot deadlock
//! - disk reads for a single slice may happen under the mutex

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use blink_cache::{Evictable, RamBudget, ScratchFile, SliceStore, lock};
use blink_core::{
    BitDepth, CacheFileId, Error, FrameBuffer, Header, OriginalState, PixelCoding, Result, Wcs,
};
use blink_lut::ColorTable;
use tracing::{debug, trace, warn};

use crate::contrast::{ContrastEngine, ContrastState};
use crate::events::StackEvent;
use crate::permute::AxisPermutation;
use crate::task::{TaskController, TaskRequest, TaskState};

/// How the view layer is cycling frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackMode {
    /// One frame shown; activating a frame loads its original pixels.
    #[default]
    Paused,
    /// Frames cycled for comparison; only display pixels are needed.
    Blinking {
        /// Time each frame stays on screen.
        delay: Duration,
    },
}

/// Residency and I/O counters of one stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackStats {
    /// Number of frames.
    pub depth: usize,
    /// Frames whose original pixels are in RAM.
    pub resident_frames: usize,
    /// Bytes of original pixels in RAM.
    pub resident_bytes: u64,
    /// Slices read from cache files.
    pub loads: u64,
    /// Slices evicted.
    pub evictions: u64,
    /// Slices spilled to scratch.
    pub spills: u64,
    /// Original pixels were dropped after a low-memory permutation.
    pub degraded: bool,
}

/// Everything guarded by the stack mutex.
#[derive(Debug)]
pub(crate) struct StackState {
    pub frames: Vec<FrameBuffer>,
    pub width: usize,
    pub height: usize,
    pub coding: PixelCoding,
    pub active: usize,
    pub mode: PlaybackMode,
    pub permutation: AxisPermutation,
    /// Header of the natural layout; the current header derives from it.
    pub natural_header: Header,
    pub natural_wcs: Option<Wcs>,
    /// Frame labels saved when leaving the natural layout.
    pub natural_labels: Vec<String>,
    pub header: Header,
    pub wcs: Option<Wcs>,
    pub contrast: ContrastState,
    pub store: SliceStore,
    pub degraded: bool,
    pub owned_files: Vec<CacheFileId>,
}

impl StackState {
    pub fn new(width: usize, height: usize, coding: PixelCoding, header: Header, wcs: Option<Wcs>, store: SliceStore) -> Self {
        Self {
            frames: Vec::new(),
            width,
            height,
            coding,
            active: 0,
            mode: PlaybackMode::default(),
            permutation: AxisPermutation::Natural,
            natural_header: header.clone(),
            natural_wcs: wcs.clone(),
            natural_labels: Vec::new(),
            header,
            wcs,
            contrast: ContrastState::default(),
            store,
            degraded: false,
            owned_files: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn check_frame(&self, index: usize) -> Result<()> {
        if index >= self.frames.len() {
            return Err(Error::frame_out_of_range(index, self.frames.len()));
        }
        Ok(())
    }

    pub fn resident_bytes(&self) -> u64 {
        self.frames.iter().map(|f| f.resident_bytes() as u64).sum()
    }

    /// Original bytes of a frame, from RAM or read from its cache file.
    pub fn coded_slice(&self, index: usize) -> Result<std::borrow::Cow<'_, [u8]>> {
        let frame = &self.frames[index];
        match frame.original() {
            Some(bytes) => Ok(std::borrow::Cow::Borrowed(bytes)),
            None => Ok(std::borrow::Cow::Owned(self.store.read_cached(index, frame.cache())?)),
        }
    }
}

/// State shared between the stack handle, its worker and the budget.
pub(crate) struct StackShared {
    pub id: u64,
    pub label: String,
    pub state: Mutex<StackState>,
    pub budget: Arc<RamBudget>,
    pub scratch: Option<Arc<ScratchFile>>,
    pub engine: ContrastEngine,
    events: Mutex<Option<Sender<StackEvent>>>,
}

impl StackShared {
    pub fn new(
        id: u64,
        label: String,
        state: StackState,
        budget: Arc<RamBudget>,
        scratch: Option<Arc<ScratchFile>>,
        engine: ContrastEngine,
    ) -> Self {
        Self {
            id,
            label,
            state: Mutex::new(state),
            budget,
            scratch,
            engine,
            events: Mutex::new(None),
        }
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, StackState> {
        lock(&self.state)
    }

    /// Sends an event to the subscriber, if any.
    pub fn emit(&self, event: StackEvent) {
        let mut events = lock(&self.events);
        if let Some(tx) = events.as_ref()
            && tx.send(event).is_err()
        {
            *events = None;
        }
    }

    /// Logs and forwards a user-visible warning.
    pub fn warn_user(&self, message: String) {
        warn!(stack = self.id, "{message}");
        self.emit(StackEvent::Warning(message));
    }

    pub fn subscribe(&self) -> Receiver<StackEvent> {
        let (tx, rx) = mpsc::channel();
        *lock(&self.events) = Some(tx);
        rx
    }

    /// Evicts frames in index order starting after the active frame, skipping
    /// the active frame and `skip`, until `needed` bytes are freed.
    pub fn evict_sweep(&self, st: &mut StackState, needed: u64, skip: Option<usize>) -> u64 {
        let depth = st.frames.len();
        if depth == 0 || needed == 0 {
            return 0;
        }
        let mut freed = 0u64;
        let start = st.active + 1;
        for k in 0..depth {
            if freed >= needed {
                break;
            }
            let i = (start + k) % depth;
            if i == st.active || Some(i) == skip {
                continue;
            }
            let StackState { frames, store, .. } = &mut *st;
            freed += store.evict(i, &mut frames[i]) as u64;
        }
        self.budget.release(freed);
        freed
    }

    /// Evicts every evictable frame.
    pub fn evict_everything(&self, st: &mut StackState) -> u64 {
        let StackState { frames, store, .. } = &mut *st;
        let freed: u64 = frames
            .iter_mut()
            .enumerate()
            .map(|(i, f)| store.evict(i, f) as u64)
            .sum();
        self.budget.release(freed);
        freed
    }

    /// Makes the original pixels of `index` resident.
    ///
    /// Returns `Ok(false)` when the budget cannot make room. A cache read
    /// failure marks the frame as having no usable backing.
    pub fn ensure_loaded(&self, index: usize) -> Result<bool> {
        let bytes = {
            let st = self.lock();
            st.check_frame(index)?;
            let frame = &st.frames[index];
            match frame.original_state() {
                OriginalState::Resident => return Ok(true),
                OriginalState::Unavailable => return Err(Error::unavailable(index)),
                OriginalState::Cached => st.store.slice_bytes() as u64,
            }
        };

        if !self.budget.try_reserve(bytes) {
            {
                let mut st = self.lock();
                let short = bytes.saturating_sub(self.budget.available());
                let freed = self.evict_sweep(&mut st, short, Some(index));
                trace!(stack = self.id, frame = index, freed, "self eviction");
            }
            if !self.budget.acquire(bytes, self.id) {
                debug!(stack = self.id, frame = index, bytes, "not enough memory to load slice");
                return Ok(false);
            }
        }

        let mut st = self.lock();
        if index >= st.frames.len() || st.frames[index].is_resident() {
            self.budget.release(bytes);
            return Ok(index < st.frames.len());
        }
        let StackState { frames, store, .. } = &mut *st;
        match store.load(index, &mut frames[index]) {
            Ok(loaded) => {
                // geometry may have changed since the reservation
                let loaded = loaded as u64;
                if loaded > bytes {
                    self.budget.force_reserve(loaded - bytes);
                } else {
                    self.budget.release(bytes - loaded);
                }
                Ok(true)
            }
            Err(e) => {
                self.budget.release(bytes);
                if e.is_cache_error() {
                    frames[index].set_cache(None);
                }
                Err(e)
            }
        }
    }

    /// Writes resident-only frames to the scratch file so they can be evicted.
    pub fn spill_resident(&self) {
        let Some(scratch) = &self.scratch else {
            return;
        };
        let mut st = self.lock();
        let StackState { frames, store, .. } = &mut *st;
        let mut failed = None;
        for (i, frame) in frames.iter_mut().enumerate() {
            if let Err(e) = store.spill(i, frame, scratch) {
                failed = Some(e);
                break;
            }
        }
        drop(st);
        if let Some(e) = failed {
            self.warn_user(format!("{}: cannot spill frames to scratch: {e}", self.label));
        }
    }

    pub fn stats(&self) -> StackStats {
        let st = self.lock();
        let store = st.store.stats();
        StackStats {
            depth: st.depth(),
            resident_frames: st.frames.iter().filter(|f| f.is_resident()).count(),
            resident_bytes: st.resident_bytes(),
            loads: store.loads,
            evictions: store.evictions,
            spills: store.spills,
            degraded: st.degraded,
        }
    }
}

impl Evictable for StackShared {
    fn member_id(&self) -> u64 {
        self.id
    }

    fn resident_bytes(&self) -> u64 {
        self.lock().resident_bytes()
    }

    fn free_at_least(&self, bytes: u64) -> u64 {
        let mut st = self.lock();
        self.evict_sweep(&mut st, bytes, None)
    }

    fn free_all(&self) -> u64 {
        let mut st = self.lock();
        self.evict_everything(&mut st)
    }
}

impl Drop for StackShared {
    fn drop(&mut self) {
        let st = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        self.budget.release(st.resident_bytes());
        // other stacks may share the file; they reopen it lazily
        for id in st.owned_files.drain(..) {
            st.store.files().close(id);
        }
        debug!(stack = self.id, "stack freed");
    }
}

/// A blink sequence or cube of same-sized frames.
///
/// Created through [`BlinkRegistry`](crate::BlinkRegistry). Dropping the
/// stack cancels its background task, returns its bytes to the budget and
/// closes its cache files.
pub struct MultiFrameStack {
    shared: Arc<StackShared>,
    tasks: TaskController,
}

impl std::fmt::Debug for MultiFrameStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.lock();
        f.debug_struct("MultiFrameStack")
            .field("id", &self.shared.id)
            .field("label", &self.shared.label)
            .field("dims", &(st.width, st.height, st.depth()))
            .field("bit_depth", &st.coding.bit_depth)
            .finish()
    }
}

impl MultiFrameStack {
    pub(crate) fn from_shared(shared: Arc<StackShared>) -> Self {
        let weak: Weak<dyn Evictable> = Arc::downgrade(&shared) as Weak<dyn Evictable>;
        shared.budget.register(weak);
        Self {
            shared,
            tasks: TaskController::new(),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<StackShared> {
        &self.shared
    }

    /// Registry-assigned id.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Stack label.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Frame width.
    pub fn width(&self) -> usize {
        self.shared.lock().width
    }

    /// Frame height.
    pub fn height(&self) -> usize {
        self.shared.lock().height
    }

    /// Number of frames.
    pub fn depth(&self) -> usize {
        self.shared.lock().depth()
    }

    /// `(width, height, depth)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        let st = self.shared.lock();
        (st.width, st.height, st.depth())
    }

    /// Encoding of original pixels.
    pub fn bit_depth(&self) -> BitDepth {
        self.shared.lock().coding.bit_depth
    }

    /// Encoding plus calibration of original pixels.
    pub fn coding(&self) -> PixelCoding {
        self.shared.lock().coding
    }

    /// Current axis layout.
    pub fn permutation(&self) -> AxisPermutation {
        self.shared.lock().permutation
    }

    /// Header of the current layout.
    pub fn header(&self) -> Header {
        self.shared.lock().header.clone()
    }

    /// Calibration of the current layout, if valid.
    pub fn wcs(&self) -> Option<Wcs> {
        self.shared.lock().wcs.clone()
    }

    /// Current contrast settings.
    pub fn contrast(&self) -> ContrastState {
        self.shared.lock().contrast.clone()
    }

    /// Replaces contrast settings without recomputing display pixels.
    pub fn set_contrast(&self, contrast: ContrastState) {
        self.shared.lock().contrast = contrast;
    }

    /// Whether original pixels were dropped for the session.
    pub fn is_degraded(&self) -> bool {
        self.shared.lock().degraded
    }

    /// Index of the displayed frame.
    pub fn active_frame(&self) -> usize {
        self.shared.lock().active
    }

    /// Playback mode.
    pub fn playback_mode(&self) -> PlaybackMode {
        self.shared.lock().mode
    }

    /// Switches between paused and blinking playback.
    pub fn set_playback_mode(&self, mode: PlaybackMode) {
        self.shared.lock().mode = mode;
    }

    /// Makes `index` the displayed frame.
    ///
    /// In paused mode the frame's original pixels are loaded as well; a
    /// cache failure is reported once as a warning and the frame stays
    /// displayable. In blinking mode nothing is loaded.
    pub fn activate_frame(&self, index: usize) -> Result<()> {
        let mode = {
            let mut st = self.shared.lock();
            st.check_frame(index)?;
            st.active = index;
            st.mode
        };
        trace!(stack = self.shared.id, frame = index, ?mode, "activate frame");

        if mode != PlaybackMode::Paused {
            return Ok(());
        }
        match self.shared.ensure_loaded(index) {
            Ok(true) => {}
            Ok(false) => debug!(frame = index, "originals not loaded, budget exhausted"),
            Err(e) if e.is_cache_error() => {
                self.shared
                    .warn_user(format!("{}: frame {index} lost its cached pixels: {e}", self.shared.label));
            }
            Err(e) if e.is_unavailable() => trace!(frame = index, "frame has display pixels only"),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Advances the active frame cyclically and returns it.
    pub fn next_frame(&self) -> usize {
        let mut st = self.shared.lock();
        if st.depth() > 0 {
            st.active = (st.active + 1) % st.depth();
        }
        st.active
    }

    /// Loads the original pixels of a frame. `Ok(false)` when memory is short.
    pub fn ensure_loaded(&self, index: usize) -> Result<bool> {
        self.shared.ensure_loaded(index)
    }

    /// Drops the original pixels of a frame if they can be reloaded.
    /// Returns the bytes freed.
    pub fn evict(&self, index: usize) -> Result<u64> {
        let mut st = self.shared.lock();
        st.check_frame(index)?;
        let StackState { frames, store, .. } = &mut *st;
        let freed = store.evict(index, &mut frames[index]) as u64;
        self.shared.budget.release(freed);
        Ok(freed)
    }

    /// Residency of a frame's original pixels.
    pub fn original_state(&self, index: usize) -> Result<OriginalState> {
        let st = self.shared.lock();
        st.check_frame(index)?;
        Ok(st.frames[index].original_state())
    }

    /// Whether `bytes` more could be loaded, asking other stacks to free
    /// memory first if needed.
    pub fn can_load(&self, bytes: u64) -> bool {
        self.shared.budget.can_load(bytes, self.shared.id)
    }

    /// Evicts this stack's slices until `bytes` are freed. May free less.
    pub fn free_at_least(&self, bytes: u64) -> u64 {
        Evictable::free_at_least(&*self.shared, bytes)
    }

    /// Evicts every evictable slice of this stack.
    pub fn free_all(&self) -> u64 {
        Evictable::free_all(&*self.shared)
    }

    /// Copy of a frame's display pixels, top row first.
    pub fn display_pixels(&self, index: usize) -> Result<Vec<u8>> {
        self.with_display(index, <[u8]>::to_vec)
    }

    /// Runs `f` on a frame's display pixels without copying them.
    pub fn with_display<R>(&self, index: usize, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let st = self.shared.lock();
        st.check_frame(index)?;
        Ok(f(st.frames[index].display()))
    }

    /// Display pixels of the active frame; empty for an empty stack.
    pub fn active_display(&self) -> Vec<u8> {
        let st = self.shared.lock();
        st.frames.get(st.active).map(|f| f.display().to_vec()).unwrap_or_default()
    }

    /// RGBA rendering of a frame through a color table.
    pub fn render_rgba(&self, index: usize, table: &ColorTable) -> Result<Vec<u8>> {
        self.with_display(index, |d| table.to_rgba(d))
    }

    /// Provenance label of a frame.
    pub fn frame_label(&self, index: usize) -> Result<String> {
        let st = self.shared.lock();
        st.check_frame(index)?;
        Ok(st.frames[index].label().to_string())
    }

    /// Renames a frame.
    pub fn set_frame_label(&self, index: usize, label: impl Into<String>) -> Result<()> {
        let mut st = self.shared.lock();
        st.check_frame(index)?;
        st.frames[index].set_label(label);
        Ok(())
    }

    /// Residency counters.
    pub fn stats(&self) -> StackStats {
        self.shared.stats()
    }

    /// Registers the receiver of [`StackEvent`]s, replacing any previous one.
    pub fn subscribe(&self) -> Receiver<StackEvent> {
        self.shared.subscribe()
    }

    /// Queues a background task. See [`TaskController::submit`].
    pub fn submit(&self, request: TaskRequest) -> Result<()> {
        self.tasks.submit(&self.shared, request)
    }

    /// Requests cancellation of the running task and waits for the worker.
    pub fn cancel_task(&self) {
        self.tasks.cancel();
    }

    /// Waits for the background worker to go idle.
    pub fn wait_task(&self) {
        self.tasks.wait();
    }

    /// State of the background worker.
    pub fn task_state(&self) -> TaskState {
        self.tasks.state()
    }

    /// Frames started by the background worker since the stack was created.
    pub fn task_frames_processed(&self) -> u64 {
        self.tasks.frames_processed()
    }
}

impl Drop for MultiFrameStack {
    fn drop(&mut self) {
        self.tasks.cancel();
        self.shared.budget.unregister(self.shared.id);
    }
}
