// src/exec/task_runner.rs

//! Execution unit: runs one task to completion.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::{Completion, ScheduledTask, TaskRecord, TaskRegistry};
use crate::engine::RunEvent;
use crate::engine::abort::AbortSignal;
use crate::engine::ledger::Reservation;
use crate::errors::Result;
use crate::exec::backend::{ExecOutcome, ExecutionResult, ExecutorBackend};
use crate::types::{FailureReason, TaskId};

/// Shared handles every execution unit needs.
pub struct UnitContext<E: ExecutorBackend> {
    pub registry: Arc<TaskRegistry>,
    pub backend: Arc<E>,
    pub abort: AbortSignal,
    pub events: mpsc::UnboundedSender<RunEvent>,
}

impl<E: ExecutorBackend> Clone for UnitContext<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            backend: Arc::clone(&self.backend),
            abort: self.abort.clone(),
            events: self.events.clone(),
        }
    }
}

/// Start an execution unit for `task`.
///
/// The `Pending -> Running` transition happens synchronously and the updated
/// record is returned, so the caller can treat "reserved + marked running"
/// as one step. The command itself runs on a spawned Tokio task which finishes the
/// record, releases `reservation` and emits [`RunEvent::TaskFinished`].
pub fn start_unit<E: ExecutorBackend>(
    task: ScheduledTask,
    reservation: Reservation,
    ctx: &UnitContext<E>,
) -> Result<TaskRecord> {
    let record = ctx.registry.mark_running(&task.id)?;

    let guard = UnitGuard {
        id: task.id.clone(),
        registry: Arc::clone(&ctx.registry),
        events: ctx.events.clone(),
        reservation: Some(reservation),
        reported: false,
    };
    let backend = Arc::clone(&ctx.backend);
    let abort = ctx.abort.clone();

    tokio::spawn(async move {
        let result = backend.execute(task, abort).await;
        guard.complete(result);
    });

    Ok(record)
}

/// Map a backend result onto the task's terminal state.
pub fn classify(result: ExecutionResult) -> Completion {
    let ExecutionResult {
        outcome,
        stdout,
        mut stderr,
    } = result;

    match outcome {
        ExecOutcome::Exited(0) => Completion::success(stdout, stderr),
        ExecOutcome::Exited(code) => {
            Completion::failure(FailureReason::ExitCode { code }, stdout, stderr)
        }
        ExecOutcome::LaunchFailed(message) => {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&message);
            Completion::failure(FailureReason::Launch { message }, stdout, stderr)
        }
        ExecOutcome::TimedOut => Completion::failure(FailureReason::Timeout, stdout, stderr),
        ExecOutcome::Killed => Completion::failure(FailureReason::Aborted, stdout, stderr),
    }
}

/// Owns everything an execution unit must hand back exactly once.
///
/// If the unit's future is dropped or panics before reporting, `Drop` marks
/// the task failed, releases the reservation and still notifies the loop.
struct UnitGuard {
    id: TaskId,
    registry: Arc<TaskRegistry>,
    events: mpsc::UnboundedSender<RunEvent>,
    reservation: Option<Reservation>,
    reported: bool,
}

impl UnitGuard {
    fn complete(mut self, result: ExecutionResult) {
        let completion = classify(result);
        self.report(completion);
    }

    fn report(&mut self, completion: Completion) {
        if self.reported {
            return;
        }
        self.reported = true;

        let status = completion.status;
        match &completion.failure {
            None => info!(task = %self.id, "task completed"),
            Some(reason) => warn!(task = %self.id, %reason, "task failed"),
        }

        if let Err(e) = self.registry.finish(&self.id, completion) {
            error!(task = %self.id, error = %e, "could not record task completion");
        }

        // Release before notifying so the loop sees the freed capacity.
        drop(self.reservation.take());

        if self
            .events
            .send(RunEvent::TaskFinished {
                id: self.id.clone(),
                status,
            })
            .is_err()
        {
            debug!(task = %self.id, "scheduler gone; completion event dropped");
        }
    }
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        if !self.reported {
            let completion = Completion::failure(
                FailureReason::Internal {
                    message: "execution unit ended without reporting an outcome".to_string(),
                },
                String::new(),
                String::new(),
            );
            self.report(completion);
        }
    }
}
