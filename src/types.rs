use std::fmt;

use serde::Serialize;

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Lifecycle state of a task.
///
/// A task moves `Pending -> Running -> {Completed | Failed}` exactly once.
/// The only shortcut is `Pending -> Failed`, used for tasks that can never
/// start (blocked by a failed dependency, or the run was aborted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// `Completed` and `Failed` are terminal; a task never leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a task ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The child process exited with a non-zero code (`-1` when killed by a
    /// signal).
    ExitCode { code: i32 },
    /// The child process could not be spawned at all.
    Launch { message: String },
    /// The per-task timeout expired and the child was killed.
    Timeout,
    /// A (possibly transitive) dependency failed; the task never started.
    BlockedByDependency { dependency: TaskId },
    /// The run was aborted before or while the task ran.
    Aborted,
    /// The execution unit itself went away without reporting an outcome.
    Internal { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ExitCode { code } => write!(f, "exited with code {code}"),
            FailureReason::Launch { message } => write!(f, "launch failed: {message}"),
            FailureReason::Timeout => f.write_str("timed out"),
            FailureReason::BlockedByDependency { dependency } => {
                write!(f, "blocked by failed dependency '{dependency}'")
            }
            FailureReason::Aborted => f.write_str("aborted"),
            FailureReason::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

/// Resources a task holds while it is `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResourceCost {
    /// Worker slots (parallelism granted to the task, e.g. `make -j`).
    pub worker_slots: u32,
    /// Memory reservation in MiB.
    pub memory_mb: u64,
}

impl ResourceCost {
    pub fn new(worker_slots: u32, memory_mb: u64) -> Self {
        Self {
            worker_slots,
            memory_mb,
        }
    }
}
