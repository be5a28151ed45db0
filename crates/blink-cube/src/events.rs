//! Notifications from a stack to the view layer.

use std::fmt;

/// Kind of background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Recut one frame.
    RecutFrame,
    /// Recut every frame with a shared window.
    RecutStack,
    /// Physically transpose the cube.
    PermuteAxes,
    /// Append planes as new frames.
    AppendFrames,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RecutFrame => "recut frame",
            Self::RecutStack => "recut stack",
            Self::PermuteAxes => "permute axes",
            Self::AppendFrames => "append frames",
        })
    }
}

/// Event delivered over the channel returned by
/// [`MultiFrameStack::subscribe`](crate::MultiFrameStack::subscribe).
#[derive(Debug, Clone, PartialEq)]
pub enum StackEvent {
    /// Display pixels changed; sent once per logical completion.
    Repaint {
        /// Task that finished.
        kind: TaskKind,
    },
    /// Something degraded but the operation went on.
    Warning(String),
    /// A task stopped on an error.
    Failed {
        /// Task that failed.
        kind: TaskKind,
        /// Error message.
        error: String,
    },
    /// A task was cancelled before completing.
    Cancelled {
        /// Task that was cancelled.
        kind: TaskKind,
    },
}
