//! Owner of everything stacks share.
//!
//! A [`BlinkRegistry`] holds the RAM budget, the cache file pool, the
//! optional scratch file and the id and numbering counters. Independent
//! registries never interfere, so tests can run side by side.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use blink_cache::{BudgetConfig, BudgetReport, CacheFiles, RamBudget, ScratchFile, SliceStore};
use blink_core::{
    CacheLocation, Error, FrameBuffer, Header, ImagePlane, PixelCoding, Plane, Result, Wcs,
};
use tracing::{debug, info};

use crate::append::conform;
use crate::contrast::ContrastEngine;
use crate::stack::{MultiFrameStack, StackShared, StackState};
use crate::task::uninterrupted;

/// Registry settings.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// RAM budget for original pixels.
    pub budget: BudgetConfig,
    /// Directory for the scratch cache file; without one, frames built
    /// from in-memory planes cannot be evicted.
    pub scratch_dir: Option<PathBuf>,
}

impl RegistryConfig {
    /// Settings with the given budget and no scratch file.
    pub fn with_budget(budget: BudgetConfig) -> Self {
        Self {
            budget,
            scratch_dir: None,
        }
    }

    /// Budget resolved from the environment.
    pub fn from_env() -> Self {
        Self::with_budget(BudgetConfig::from_env())
    }

    /// Sets the scratch directory.
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}

/// A raw cube stored as consecutive coded slices in a file.
#[derive(Debug, Clone)]
pub struct CubeSource {
    /// File holding the slices.
    pub path: PathBuf,
    /// Slice width.
    pub width: usize,
    /// Slice height.
    pub height: usize,
    /// Number of slices.
    pub depth: usize,
    /// Encoding of the slices.
    pub coding: PixelCoding,
    /// Offset of the first slice.
    pub data_offset: u64,
    /// Keywords describing the cube.
    pub header: Header,
    /// Stack label.
    pub label: String,
}

/// Owner of the budget, cache files and counters shared by stacks.
#[derive(Debug)]
pub struct BlinkRegistry {
    budget: Arc<RamBudget>,
    files: Arc<CacheFiles>,
    scratch: Option<Arc<ScratchFile>>,
    next_stack_id: AtomicU64,
    next_plane_number: AtomicU64,
}

impl BlinkRegistry {
    /// Creates a registry, opening the scratch file when configured.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let files = Arc::new(CacheFiles::new());
        let scratch = match &config.scratch_dir {
            Some(dir) => Some(Arc::new(ScratchFile::create_in(dir, &files)?)),
            None => None,
        };
        let budget = Arc::new(RamBudget::new(config.budget));
        info!(budget = %budget.report(), scratch = scratch.is_some(), "blink registry ready");
        Ok(Self {
            budget,
            files,
            scratch,
            next_stack_id: AtomicU64::new(1),
            next_plane_number: AtomicU64::new(1),
        })
    }

    /// Shared RAM budget.
    pub fn budget(&self) -> &Arc<RamBudget> {
        &self.budget
    }

    /// Shared cache file pool.
    pub fn files(&self) -> &Arc<CacheFiles> {
        &self.files
    }

    /// Budget usage across all stacks.
    pub fn report(&self) -> BudgetReport {
        self.budget.report()
    }

    /// Next label in the registry's plane numbering, e.g. `Blink 3`.
    pub fn next_plane_label(&self, prefix: &str) -> String {
        let n = self.next_plane_number.fetch_add(1, Ordering::Relaxed);
        format!("{prefix} {n}")
    }

    fn shared(&self, label: String, state: StackState) -> Arc<StackShared> {
        let id = self.next_stack_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(StackShared::new(
            id,
            label,
            state,
            Arc::clone(&self.budget),
            self.scratch.clone(),
            ContrastEngine::default(),
        ))
    }

    /// Builds a stack from existing planes.
    ///
    /// The first plane fixes the size, projection and encoding; the others
    /// are conformed to it. Only plain images can be stacked.
    pub fn stack_from_planes<C>(&self, planes: Vec<Plane<C>>, label: Option<String>) -> Result<MultiFrameStack> {
        let mut images = Vec::with_capacity(planes.len());
        for plane in planes {
            match plane {
                Plane::PlainImage(image) => images.push(image),
                other => {
                    return Err(Error::UnsupportedPlane(format!(
                        "{} plane cannot be a frame of a stack",
                        other.kind_name()
                    )));
                }
            }
        }
        self.stack_from_images(images, label)
    }

    /// Builds a stack from decoded images. See [`stack_from_planes`](Self::stack_from_planes).
    pub fn stack_from_images(&self, images: Vec<ImagePlane>, label: Option<String>) -> Result<MultiFrameStack> {
        let mut images = images.into_iter();
        let first = images
            .next()
            .ok_or_else(|| Error::other("a stack needs at least one plane"))?;
        let label = label.unwrap_or_else(|| self.next_plane_label("Blink"));

        let coding = first
            .coding
            .or_else(|| images.as_slice().iter().find_map(|p| p.coding))
            .unwrap_or(PixelCoding::new(blink_core::BitDepth::U8));
        let wcs = first.wcs.clone().or_else(|| Wcs::from_header(&first.header).ok());
        let (width, height) = (first.width, first.height);
        let mut header = first.header.clone();
        header.set("NAXIS", "3");
        header.set("NAXIS1", width.to_string());
        header.set("NAXIS2", height.to_string());

        let store = SliceStore::new(Arc::clone(&self.files), width * height * coding.bytes_per_pixel());
        let mut state = StackState::new(width, height, coding, header, wcs.clone(), store);
        let first = conform(first, width, height, wcs.as_ref(), &coding, true)?;
        let contrast_source = first.original().map(<[u8]>::to_vec);
        self.budget.force_reserve(first.resident_bytes() as u64);
        state.frames.push(first);

        let shared = self.shared(label, state);
        let engine = &shared.engine;
        if let Some(coded) = contrast_source
            && let Some((lo, hi)) = engine.autocut(&coded, &coding)
        {
            shared.lock().contrast.set_cuts(lo, hi);
        }

        let stack = MultiFrameStack::from_shared(shared);
        let mut rest = images.collect();
        stack.shared().append_planes(&mut rest, &uninterrupted)?;
        {
            let mut st = stack.shared().lock();
            let depth = st.depth().to_string();
            st.natural_header.set("NAXIS3", depth.clone());
            st.header.set("NAXIS3", depth);
        }
        stack.shared().spill_resident();
        debug!(stack = stack.id(), dims = ?stack.dims(), "stack built from planes");
        Ok(stack)
    }

    /// Opens a file-backed cube. Nothing is loaded; display pixels are
    /// computed by streaming each slice once with an autocut from slice 0.
    pub fn open_cube(&self, source: CubeSource) -> Result<MultiFrameStack> {
        let CubeSource {
            path,
            width,
            height,
            depth,
            coding,
            data_offset,
            mut header,
            label,
        } = source;
        if width == 0 || height == 0 || depth == 0 {
            return Err(Error::other(format!("empty cube {width}x{height}x{depth}")));
        }
        let slice_bytes = width * height * coding.bytes_per_pixel();
        let file = self.files.register(&path);
        header.set("NAXIS", "3");
        header.set("NAXIS1", width.to_string());
        header.set("NAXIS2", height.to_string());
        header.set("NAXIS3", depth.to_string());
        let wcs = Wcs::from_header(&header).ok();

        let store = SliceStore::new(Arc::clone(&self.files), slice_bytes);
        let mut state = StackState::new(width, height, coding, header, wcs, store);
        state.owned_files.push(file);
        state.frames = (0..depth)
            .map(|i| {
                let location = CacheLocation::new(file, data_offset + (i * slice_bytes) as u64);
                FrameBuffer::cached(width * height, location, format!("{label} [{}/{depth}]", i + 1))
            })
            .collect();

        let stack = MultiFrameStack::from_shared(self.shared(label, state));
        let summary = stack.recut_stack(0.0, 1.0, true)?;
        if summary.recut == 0 {
            return Err(Error::cache_io(
                &path,
                data_offset,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no slice could be read"),
            ));
        }
        info!(stack = stack.id(), path = %path.display(), width, height, depth, "opened cube");
        Ok(stack)
    }
}
