// src/engine/observer.rs

use crate::dag::TaskRecord;
use crate::report::RunReport;

/// Lifecycle callbacks fired by the scheduling loop.
///
/// All methods default to no-ops. They run on the scheduler's task, so
/// implementations should return quickly.
pub trait RunObserver: Send + Sync {
    fn on_task_started(&self, _task: &TaskRecord) {}

    /// Fired for every task reaching a terminal state, including tasks that
    /// never started (blocked or aborted).
    fn on_task_finished(&self, _task: &TaskRecord) {}

    fn on_run_finished(&self, _report: &RunReport) {}
}
