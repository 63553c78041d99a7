// src/report/mod.rs

//! Outcome reporting.
//!
//! After a run, every task record is summarised into a [`RunReport`]. The
//! slim per-task [`TaskRecordSummary`] list is what gets handed to an
//! external [`FaultAnalyzer`]; the report itself carries the diagnostics
//! (failure reason, captured output) needed to explain each failure.

pub mod analyzer;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;

use crate::dag::TaskRecord;
use crate::errors::Result;
use crate::types::{FailureReason, TaskId, TaskStatus};

pub use analyzer::{FaultAnalyzer, LogFaultAnalyzer};

/// The record handed to a fault analyzer: id, final status, duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecordSummary {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub duration_seconds: f64,
}

/// Full per-task entry of a run report.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub duration_seconds: f64,
    /// Offset from run start, for tasks that started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at_seconds: Option<f64>,
    pub worker_slots: u32,
    pub memory_mb: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Failed tasks grouped by reason kind (`exit_code`, `timeout`, ...).
    pub failures_by_reason: BTreeMap<String, usize>,
    pub elapsed_seconds: f64,
    /// Tasks in registration order.
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn from_records(records: &[TaskRecord], run_started: Instant, elapsed: Duration) -> Self {
        let offset = |at: Option<Instant>| {
            at.map(|t| t.saturating_duration_since(run_started).as_secs_f64())
        };

        let mut failures_by_reason = BTreeMap::new();
        let tasks: Vec<TaskReport> = records
            .iter()
            .map(|r| {
                if let Some(reason) = &r.failure {
                    *failures_by_reason
                        .entry(reason_kind(reason).to_string())
                        .or_insert(0) += 1;
                }
                TaskReport {
                    task_id: r.spec.id.clone(),
                    name: r.spec.name.clone(),
                    status: r.status,
                    failure: r.failure.clone(),
                    duration_seconds: r.duration().as_secs_f64(),
                    started_at_seconds: offset(r.started_at),
                    finished_at_seconds: offset(r.finished_at),
                    worker_slots: r.spec.cost.worker_slots,
                    memory_mb: r.spec.cost.memory_mb,
                    stdout: r.stdout.clone(),
                    stderr: r.stderr.clone(),
                }
            })
            .collect();

        Self {
            total: tasks.len(),
            completed: count(&tasks, TaskStatus::Completed),
            failed: count(&tasks, TaskStatus::Failed),
            failures_by_reason,
            elapsed_seconds: elapsed.as_secs_f64(),
            tasks,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.completed == self.total
    }

    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task_id == id)
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Failed)
    }

    /// The records forwarded to a fault analyzer.
    pub fn summaries(&self) -> Vec<TaskRecordSummary> {
        self.tasks
            .iter()
            .map(|t| TaskRecordSummary {
                task_id: t.task_id.clone(),
                status: t.status,
                duration_seconds: t.duration_seconds,
            })
            .collect()
    }

    /// Human-readable summary, listing every failed task with its
    /// diagnostics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "build finished in {:.1}s: {} tasks, {} completed, {} failed",
            self.elapsed_seconds, self.total, self.completed, self.failed
        );

        for task in &self.tasks {
            let _ = writeln!(
                out,
                "  {:<10} {} ({:.1}s)",
                task.status.to_string(),
                task.task_id,
                task.duration_seconds
            );
        }

        for task in self.failed_tasks() {
            let _ = writeln!(out);
            match &task.failure {
                Some(reason) => {
                    let _ = writeln!(out, "task '{}' failed: {reason}", task.task_id);
                }
                None => {
                    let _ = writeln!(out, "task '{}' failed", task.task_id);
                }
            }
            let diagnostics = task.stderr.trim();
            if !diagnostics.is_empty() {
                for line in diagnostics.lines() {
                    let _ = writeln!(out, "    | {line}");
                }
            }
        }

        out
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("serialising run report")?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn count(tasks: &[TaskReport], status: TaskStatus) -> usize {
    tasks.iter().filter(|t| t.status == status).count()
}

fn reason_kind(reason: &FailureReason) -> &'static str {
    match reason {
        FailureReason::ExitCode { .. } => "exit_code",
        FailureReason::Launch { .. } => "launch",
        FailureReason::Timeout => "timeout",
        FailureReason::BlockedByDependency { .. } => "blocked_by_dependency",
        FailureReason::Aborted => "aborted",
        FailureReason::Internal { .. } => "internal",
    }
}
