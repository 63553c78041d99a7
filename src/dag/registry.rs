// src/dag/registry.rs

//! Task registry: the set of task definitions and their current status.
//!
//! All state lives behind a single `RwLock`; every mutation goes through
//! [`TaskRegistry::set_status`] (or its richer siblings `mark_running` /
//! `finish`, which share the same transition check), so readers always see
//! a consistent record.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tracing::debug;

use crate::dag::task::{TaskRecord, TaskSpec};
use crate::errors::{BuildError, Result};
use crate::types::{FailureReason, TaskId, TaskStatus};

#[derive(Debug, Default)]
struct RegistryInner {
    /// Registration order.
    order: Vec<TaskId>,
    records: HashMap<TaskId, TaskRecord>,
}

/// Per-status counts over the whole registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }
}

/// Final data recorded when a task reaches a terminal state.
#[derive(Debug, Clone)]
pub struct Completion {
    pub status: TaskStatus,
    pub failure: Option<FailureReason>,
    pub stdout: String,
    pub stderr: String,
}

impl Completion {
    pub fn success(stdout: String, stderr: String) -> Self {
        Self {
            status: TaskStatus::Completed,
            failure: None,
            stdout,
            stderr,
        }
    }

    pub fn failure(reason: FailureReason, stdout: String, stderr: String) -> Self {
        Self {
            status: TaskStatus::Failed,
            failure: Some(reason),
            stdout,
            stderr,
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    inner: RwLock<RegistryInner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new task in `Pending` state.
    pub fn add(&self, spec: TaskSpec) -> Result<()> {
        let mut inner = self.write();
        if inner.records.contains_key(&spec.id) {
            return Err(BuildError::DuplicateTask(spec.id));
        }
        let seq = inner.order.len();
        let id = spec.id.clone();
        inner.order.push(id.clone());
        inner.records.insert(id.clone(), TaskRecord::new(spec, seq));
        debug!(task = %id, seq, "registered task");
        Ok(())
    }

    /// Snapshot of a single task.
    pub fn get(&self, id: &str) -> Result<TaskRecord> {
        self.read()
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| BuildError::UnknownTask(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().records.contains_key(id)
    }

    pub fn status_of(&self, id: &str) -> Result<TaskStatus> {
        self.read()
            .records
            .get(id)
            .map(|r| r.status)
            .ok_or_else(|| BuildError::UnknownTask(id.to_string()))
    }

    /// Snapshot of every task, in registration order.
    pub fn all(&self) -> Vec<TaskRecord> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> StatusCounts {
        let inner = self.read();
        let mut counts = StatusCounts::default();
        for record in inner.records.values() {
            match record.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Whether every task is `Completed` or `Failed`.
    pub fn all_terminal(&self) -> bool {
        self.read().records.values().all(|r| r.status.is_terminal())
    }

    /// Move a task to `status`, enforcing the legal transition table.
    ///
    /// Timestamps are maintained here: leaving `Pending` for `Running` sets
    /// the start time, entering a terminal state sets the end time.
    pub fn set_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let mut inner = self.write();
        transition(&mut inner, id, status, Instant::now()).map(|_| ())
    }

    /// `Pending -> Running`, recording the start time.
    pub fn mark_running(&self, id: &str) -> Result<TaskRecord> {
        let mut inner = self.write();
        transition(&mut inner, id, TaskStatus::Running, Instant::now()).map(|r| r.clone())
    }

    /// Move a task into its terminal state with captured output and reason.
    pub fn finish(&self, id: &str, completion: Completion) -> Result<TaskRecord> {
        let mut inner = self.write();
        let record = transition(&mut inner, id, completion.status, Instant::now())?;
        record.failure = completion.failure;
        record.stdout = completion.stdout;
        record.stderr = completion.stderr;
        Ok(record.clone())
    }

    /// `Pending -> Failed` for a task that will never start.
    pub fn fail_pending(&self, id: &str, reason: FailureReason) -> Result<()> {
        let mut inner = self.write();
        let current = inner
            .records
            .get(id)
            .map(|r| r.status)
            .ok_or_else(|| BuildError::UnknownTask(id.to_string()))?;
        if current != TaskStatus::Pending {
            return Err(BuildError::InvalidTransition {
                task: id.to_string(),
                from: current,
                to: TaskStatus::Failed,
            });
        }
        let record = transition(&mut inner, id, TaskStatus::Failed, Instant::now())?;
        record.failure = Some(reason);
        Ok(())
    }
}

fn transition<'a>(
    inner: &'a mut RegistryInner,
    id: &str,
    next: TaskStatus,
    now: Instant,
) -> Result<&'a mut TaskRecord> {
    let record = inner
        .records
        .get_mut(id)
        .ok_or_else(|| BuildError::UnknownTask(id.to_string()))?;

    if !record.status.can_transition_to(next) {
        return Err(BuildError::InvalidTransition {
            task: id.to_string(),
            from: record.status,
            to: next,
        });
    }

    if next == TaskStatus::Running {
        record.started_at = Some(now);
    }
    if next.is_terminal() {
        record.finished_at = Some(now);
    }
    debug!(task = %id, from = %record.status, to = %next, "task status changed");
    record.status = next;
    Ok(record)
}
