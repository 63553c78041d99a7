// src/dag/task.rs

//! Task descriptors and per-task run records.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::types::{FailureReason, ResourceCost, TaskId, TaskStatus};

/// How a task's command is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// Run through the platform shell (`sh -c` / `cmd /C`).
    Shell(String),
    /// Exec the program directly with the given arguments.
    Argv(Vec<String>),
}

impl fmt::Display for TaskCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskCommand::Shell(cmd) => f.write_str(cmd),
            TaskCommand::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

/// Static description of a build step, as handed to the scheduler.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub id: TaskId,
    /// Display name, used for reporting only.
    pub name: String,
    pub command: TaskCommand,
    /// Tasks that must be `Completed` before this one may start.
    pub deps: Vec<TaskId>,
    pub cost: ResourceCost,
    /// Lower runs first when capacity is scarce.
    pub priority: i32,
    /// Per-task timeout; falls back to the scheduler default when `None`.
    pub timeout: Option<Duration>,
    /// Extra environment variables for the child process.
    pub env: BTreeMap<String, String>,
}

impl TaskSpec {
    /// Minimal spec: shell command, one worker slot, no memory, no deps.
    pub fn new(id: impl Into<TaskId>, command: TaskCommand) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            command,
            deps: Vec::new(),
            cost: ResourceCost::new(1, 0),
            priority: 0,
            timeout: None,
            env: BTreeMap::new(),
        }
    }
}

/// A task plus its mutable run state, as held by the registry.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub spec: TaskSpec,
    /// Registration index; the final tie-break for dispatch order.
    pub seq: usize,
    pub status: TaskStatus,
    pub failure: Option<FailureReason>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub stdout: String,
    pub stderr: String,
}

impl TaskRecord {
    pub fn new(spec: TaskSpec, seq: usize) -> Self {
        Self {
            spec,
            seq,
            status: TaskStatus::Pending,
            failure: None,
            started_at: None,
            finished_at: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// Wall time between start and end; zero for tasks that never started.
    pub fn duration(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

/// Description of a task that the scheduler wants an execution unit to run
/// now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub name: String,
    pub command: TaskCommand,
    pub cost: ResourceCost,
    /// Effective timeout (task-level, else scheduler default).
    pub timeout: Option<Duration>,
    pub env: BTreeMap<String, String>,
}

impl ScheduledTask {
    pub fn from_spec(spec: &TaskSpec, default_timeout: Option<Duration>) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            command: spec.command.clone(),
            cost: spec.cost,
            timeout: spec.timeout.or(default_timeout),
            env: spec.env.clone(),
        }
    }
}
