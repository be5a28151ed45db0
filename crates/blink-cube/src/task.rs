//! Background task control.
//!
//! Each stack has at most one worker thread. Requests of the kind already
//! running are coalesced: the newest request replaces any pending one and
//! the running pass is told to restart at its next frame boundary. A request
//! of a different kind cancels the running task and waits for it before
//! starting.
//!
//! # State machine
//!
//! ```text
//! Idle -> Running -> Completed
//!            |  ^
//!            v  |
//!     RestartRequested
//!            |
//!            v
//!        Cancelled
//! ```
//!
//! A worker reports exactly one [`StackEvent`] per logical completion:
//! `Repaint`, `Cancelled` or `Failed`. Restarted passes report nothing.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use blink_cache::lock;
use blink_core::{Error, ImagePlane, Result};
use tracing::{debug, warn};

use crate::events::{StackEvent, TaskKind};
use crate::permute::AxisPermutation;
use crate::stack::StackShared;

/// Called once per frame by bulk operations; returns
/// [`Error::TaskCancelled`] when the pass should stop.
pub(crate) type Checkpoint<'a> = &'a dyn Fn() -> Result<()>;

/// Checkpoint for synchronous calls, never interrupts.
pub(crate) fn uninterrupted() -> Result<()> {
    Ok(())
}

/// Work a stack can run in the background.
#[derive(Debug, Clone)]
pub enum TaskRequest {
    /// Recompute display pixels of one frame.
    RecutFrame {
        /// Frame index.
        index: usize,
        /// Lower cut when not autocutting.
        min: f64,
        /// Upper cut when not autocutting.
        max: f64,
        /// Compute the window from the frame's data.
        autocut: bool,
    },
    /// Recompute display pixels of every frame with one window.
    RecutStack {
        /// Lower cut when not autocutting.
        min: f64,
        /// Upper cut when not autocutting.
        max: f64,
        /// Compute the window from the first frame's data.
        autocut: bool,
    },
    /// Transpose the cube into the given layout.
    PermuteAxes(AxisPermutation),
    /// Add planes at the end of the stack.
    AppendFrames(Vec<ImagePlane>),
}

impl TaskRequest {
    /// Kind of task this request starts.
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::RecutFrame { .. } => TaskKind::RecutFrame,
            Self::RecutStack { .. } => TaskKind::RecutStack,
            Self::PermuteAxes(_) => TaskKind::PermuteAxes,
            Self::AppendFrames(_) => TaskKind::AppendFrames,
        }
    }
}

/// Worker state as seen by the stack owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskState {
    /// No task has run yet.
    #[default]
    Idle,
    /// A pass is in progress.
    Running,
    /// A newer request of the same kind arrived; the pass will restart.
    RestartRequested,
    /// The last task finished.
    Completed,
    /// The last task was cancelled or failed.
    Cancelled,
}

#[derive(Debug, Default)]
struct ControlState {
    state: TaskState,
    kind: Option<TaskKind>,
    pending: Option<TaskRequest>,
}

#[derive(Debug, Default)]
struct TaskControl {
    inner: Mutex<ControlState>,
    cancel: AtomicBool,
    restart: AtomicBool,
    processed: AtomicU64,
}

impl TaskControl {
    fn checkpoint(&self) -> Result<()> {
        if self.cancel.load(Ordering::Acquire) || self.restart.load(Ordering::Acquire) {
            return Err(Error::TaskCancelled);
        }
        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Owner side of a stack's worker thread.
#[derive(Debug, Default)]
pub struct TaskController {
    control: Arc<TaskControl>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskController {
    /// Controller with no worker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts or coalesces a request.
    ///
    /// Appends of a running append are queued behind it instead of
    /// restarting it, so no plane is dropped.
    pub(crate) fn submit(&self, shared: &Arc<StackShared>, request: TaskRequest) -> Result<()> {
        let kind = request.kind();
        {
            let mut inner = lock(&self.control.inner);
            let busy = matches!(inner.state, TaskState::Running | TaskState::RestartRequested);
            if busy && inner.kind == Some(kind) {
                let merged = match (inner.pending.take(), request) {
                    (Some(TaskRequest::AppendFrames(mut queued)), TaskRequest::AppendFrames(more)) => {
                        queued.extend(more);
                        TaskRequest::AppendFrames(queued)
                    }
                    (_, request) => request,
                };
                inner.pending = Some(merged);
                if kind != TaskKind::AppendFrames {
                    inner.state = TaskState::RestartRequested;
                    self.control.restart.store(true, Ordering::Release);
                }
                debug!(stack = shared.id, %kind, "coalesced task request");
                return Ok(());
            }
        }

        self.cancel();

        let mut inner = lock(&self.control.inner);
        self.control.cancel.store(false, Ordering::Release);
        self.control.restart.store(false, Ordering::Release);
        inner.state = TaskState::Running;
        inner.kind = Some(kind);
        inner.pending = None;
        drop(inner);

        let worker_shared = Arc::clone(shared);
        let control = Arc::clone(&self.control);
        let spawned = thread::Builder::new()
            .name(format!("blink-task-{}", shared.id))
            .spawn(move || run(&worker_shared, &control, request));
        match spawned {
            Ok(handle) => {
                *lock(&self.handle) = Some(handle);
                debug!(stack = shared.id, %kind, "task started");
                Ok(())
            }
            Err(e) => {
                lock(&self.control.inner).state = TaskState::Cancelled;
                Err(Error::Io(e))
            }
        }
    }

    /// Requests cancellation and waits for the worker to exit.
    pub fn cancel(&self) {
        self.control.cancel.store(true, Ordering::Release);
        self.join();
    }

    /// Waits for the worker to go idle, including queued restarts.
    pub fn wait(&self) {
        self.join();
    }

    fn join(&self) {
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("stack worker panicked");
            lock(&self.control.inner).state = TaskState::Cancelled;
        }
    }

    /// Current worker state.
    pub fn state(&self) -> TaskState {
        lock(&self.control.inner).state
    }

    /// Frames started by workers of this controller.
    pub fn frames_processed(&self) -> u64 {
        self.control.processed.load(Ordering::Relaxed)
    }
}

fn run(shared: &StackShared, control: &TaskControl, mut request: TaskRequest) {
    loop {
        let kind = request.kind();
        let result = guarded(|| execute(shared, control, request));

        let mut inner = lock(&control.inner);
        if let Some(next) = inner.pending.take() {
            control.restart.store(false, Ordering::Release);
            if !control.cancel.load(Ordering::Acquire) {
                inner.state = TaskState::Running;
                inner.kind = Some(next.kind());
                drop(inner);
                debug!(stack = shared.id, %kind, "restarting task");
                request = next;
                continue;
            }
        }

        match result {
            Ok(()) => {
                inner.state = TaskState::Completed;
                drop(inner);
                debug!(stack = shared.id, %kind, "task completed");
                shared.emit(StackEvent::Repaint { kind });
            }
            Err(Error::TaskCancelled) => {
                inner.state = TaskState::Cancelled;
                drop(inner);
                debug!(stack = shared.id, %kind, "task cancelled");
                shared.emit(StackEvent::Cancelled { kind });
            }
            Err(e) => {
                inner.state = TaskState::Cancelled;
                drop(inner);
                warn!(stack = shared.id, %kind, error = %e, "task failed");
                shared.emit(StackEvent::Failed {
                    kind,
                    error: e.to_string(),
                });
            }
        }
        return;
    }
}

/// Runs `f`, turning a panic into an error so it is reported as `Failed`.
fn guarded(f: impl FnOnce() -> Result<()>) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown cause".to_string());
        Err(Error::other(format!("worker panicked: {message}")))
    })
}

fn execute(shared: &StackShared, control: &TaskControl, request: TaskRequest) -> Result<()> {
    let checkpoint = || control.checkpoint();
    match request {
        TaskRequest::RecutFrame {
            index,
            min,
            max,
            autocut,
        } => {
            checkpoint()?;
            shared.recut_frame(index, min, max, autocut).map(drop)
        }
        TaskRequest::RecutStack { min, max, autocut } => shared.recut_stack(min, max, autocut, &checkpoint).map(drop),
        TaskRequest::PermuteAxes(target) => shared.permute_axes(target, &checkpoint).map(drop),
        TaskRequest::AppendFrames(planes) => {
            let mut queue = VecDeque::from(planes);
            shared.append_planes(&mut queue, &checkpoint).map(drop)
        }
    }
}
