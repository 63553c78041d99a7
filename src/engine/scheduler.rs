// src/engine/scheduler.rs

//! The scheduling loop.
//!
//! One coordinator drives the whole run:
//!
//! 1. validate the graph (cycles are fatal, the run never starts),
//! 2. dispatch every eligible task whose cost can be reserved,
//! 3. fail pending tasks that sit downstream of a failed task,
//! 4. sleep until an execution unit reports back or an abort arrives,
//!
//! and stops once every task is terminal. Dispatch only ever happens on this
//! loop, so "reserve + mark running" cannot race with another dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::dag::{
    DagGraph, ScheduledTask, TaskRegistry, TaskSpec, blocked_tasks, eligible_tasks, ready_tasks,
};
use crate::engine::RunEvent;
use crate::engine::abort::{AbortHandle, AbortMode};
use crate::engine::ledger::{ResourceLedger, ResourceLimits};
use crate::engine::observer::RunObserver;
use crate::engine::status::{RunStatus, StatusHandle};
use crate::errors::{BuildError, Result};
use crate::exec::{ExecutorBackend, UnitContext, start_unit};
use crate::report::{FaultAnalyzer, RunReport};
use crate::types::{FailureReason, TaskStatus};

/// Options that shape a run but are not resource ceilings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Timeout for tasks that do not declare their own.
    pub default_timeout: Option<Duration>,
}

pub struct BuildScheduler<E: ExecutorBackend> {
    registry: Arc<TaskRegistry>,
    ledger: Arc<ResourceLedger>,
    backend: Arc<E>,
    abort: AbortHandle,
    options: RunOptions,
    observer: Option<Arc<dyn RunObserver>>,
    analyzer: Option<Arc<dyn FaultAnalyzer>>,
}

impl<E: ExecutorBackend> std::fmt::Debug for BuildScheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildScheduler")
            .field("registry", &self.registry)
            .field("ledger", &self.ledger)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> BuildScheduler<E> {
    pub fn new(limits: ResourceLimits, backend: E) -> Self {
        Self {
            registry: Arc::new(TaskRegistry::new()),
            ledger: Arc::new(ResourceLedger::new(limits)),
            backend: Arc::new(backend),
            abort: AbortHandle::new(),
            options: RunOptions::default(),
            observer: None,
            analyzer: None,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_fault_analyzer(mut self, analyzer: Arc<dyn FaultAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Share an externally created abort handle (e.g. wired to Ctrl-C).
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Register a task.
    ///
    /// Rejects costs that could never be admitted, even on an idle ledger,
    /// so no task is ever run over budget.
    pub fn add_task(&self, spec: TaskSpec) -> Result<()> {
        check_cost(&spec, &self.ledger.limits())?;
        self.registry.add(spec)
    }

    pub fn add_tasks(&self, specs: impl IntoIterator<Item = TaskSpec>) -> Result<()> {
        for spec in specs {
            self.add_task(spec)?;
        }
        Ok(())
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.ledger
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle::new(Arc::clone(&self.registry), Arc::clone(&self.ledger))
    }

    pub fn get_run_status(&self) -> RunStatus {
        self.status_handle().get_run_status()
    }

    /// Execute every registered task and return the final report.
    ///
    /// Errors only for problems that prevent the run from starting (cycles,
    /// unknown dependencies, inadmissible costs). Per-task failures are in
    /// the report.
    pub async fn run(&self) -> Result<RunReport> {
        let specs: Vec<TaskSpec> = self.registry.all().into_iter().map(|r| r.spec).collect();
        let graph = DagGraph::from_specs(&specs);
        graph.validate()?;
        for spec in &specs {
            check_cost(spec, &self.ledger.limits())?;
        }

        let run_started = Instant::now();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<RunEvent>();
        let ctx = UnitContext {
            registry: Arc::clone(&self.registry),
            backend: Arc::clone(&self.backend),
            abort: self.abort.signal(),
            events: events_tx,
        };
        let mut abort = self.abort.signal();
        let mut in_flight: usize = 0;
        let mut stopped = false;

        info!(
            tasks = specs.len(),
            limits = ?self.ledger.limits(),
            "build run started"
        );

        loop {
            if !stopped && abort.is_aborted() {
                stopped = true;
                self.fail_all_pending(FailureReason::Aborted);
            }

            if !stopped {
                in_flight += self.dispatch_ready(&ctx);
            }
            self.fail_blocked();

            if in_flight == 0 {
                if self.registry.all_terminal() {
                    break;
                }
                // Nothing running, nothing dispatchable, yet tasks remain.
                self.resolve_no_progress();
                break;
            }

            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(RunEvent::TaskFinished { id, status }) => {
                        in_flight = in_flight.saturating_sub(1);
                        debug!(task = %id, %status, in_flight, "execution unit finished");
                        self.notify_finished(&id);
                    }
                    None => {
                        // `ctx` keeps a sender alive, so this cannot happen.
                        warn!("completion channel closed unexpectedly");
                        break;
                    }
                },
                mode = abort.aborted(), if !stopped => {
                    warn!(?mode, in_flight, "run aborted; no further tasks will be dispatched");
                    stopped = true;
                    self.fail_all_pending(FailureReason::Aborted);
                    if mode == AbortMode::Drain {
                        info!(in_flight, "waiting for in-flight tasks to finish");
                    }
                }
            }
        }

        let report = RunReport::from_records(&self.registry.all(), run_started, run_started.elapsed());
        info!(
            total = report.total,
            completed = report.completed,
            failed = report.failed,
            elapsed_s = report.elapsed_seconds,
            "build run finished"
        );

        if let Some(analyzer) = &self.analyzer {
            analyzer.analyze_parallel_build(&report.summaries());
        }
        if let Some(observer) = &self.observer {
            observer.on_run_finished(&report);
        }

        Ok(report)
    }

    /// Reserve and start every eligible task that fits, in dispatch order.
    fn dispatch_ready(&self, ctx: &UnitContext<E>) -> usize {
        let mut started = 0;

        for record in eligible_tasks(&self.registry, &self.ledger) {
            let Some(reservation) = self.ledger.try_acquire(record.spec.cost) else {
                trace!(task = %record.id(), "no capacity left for task this round");
                continue;
            };

            debug_assert!(
                within_limits(&self.ledger),
                "ledger exceeded its ceilings after reserving for {}",
                record.id()
            );

            let task = ScheduledTask::from_spec(&record.spec, self.options.default_timeout);
            // A failed start drops the reservation, which releases it.
            let running = match start_unit(task, reservation, ctx) {
                Ok(running) => running,
                Err(e) => {
                    warn!(task = %record.id(), error = %e, "could not start task; skipping");
                    continue;
                }
            };
            info!(
                task = %running.id(),
                worker_slots = running.spec.cost.worker_slots,
                memory_mb = running.spec.cost.memory_mb,
                "dispatched task"
            );
            if let Some(observer) = &self.observer {
                observer.on_task_started(&running);
            }
            started += 1;
        }

        started
    }

    /// Fail every pending task downstream of a failed task, to a fixed
    /// point.
    fn fail_blocked(&self) {
        loop {
            let blocked = blocked_tasks(&self.registry);
            if blocked.is_empty() {
                return;
            }
            for (id, dependency) in blocked {
                info!(task = %id, dependency = %dependency, "task blocked by failed dependency");
                self.fail_pending(&id, FailureReason::BlockedByDependency { dependency });
            }
        }
    }

    /// Nothing is running and nothing could be dispatched, but some tasks
    /// are still pending: none of them can ever become eligible. End them
    /// deterministically instead of waiting forever.
    fn resolve_no_progress(&self) {
        let records = self.registry.all();
        let ready = ready_tasks(&self.registry);
        if !ready.is_empty() {
            // Admission guarantees anything ready fits an idle ledger.
            warn!(
                ready = ready.len(),
                usage = ?self.ledger.usage(),
                "ready tasks could not be dispatched on an idle ledger"
            );
        }

        let stranded: Vec<_> = records
            .iter()
            .filter(|r| r.status == TaskStatus::Pending)
            .collect();
        warn!(
            stranded = stranded.len(),
            "no progress possible; failing remaining pending tasks"
        );

        for record in stranded {
            let dependency = record
                .spec
                .deps
                .iter()
                .find(|dep| {
                    records
                        .iter()
                        .any(|r| r.id() == dep.as_str() && r.status != TaskStatus::Completed)
                })
                .cloned()
                .unwrap_or_default();
            self.fail_pending(record.id(), FailureReason::BlockedByDependency { dependency });
        }
    }

    fn fail_all_pending(&self, reason: FailureReason) {
        for record in self.registry.all() {
            if record.status == TaskStatus::Pending {
                self.fail_pending(record.id(), reason.clone());
            }
        }
    }

    fn fail_pending(&self, id: &str, reason: FailureReason) {
        match self.registry.fail_pending(id, reason) {
            Ok(()) => self.notify_finished(id),
            Err(e) => warn!(task = %id, error = %e, "could not fail pending task"),
        }
    }

    fn notify_finished(&self, id: &str) {
        if let Some(observer) = &self.observer {
            if let Ok(record) = self.registry.get(id) {
                observer.on_task_finished(&record);
            }
        }
    }
}

fn check_cost(spec: &TaskSpec, limits: &ResourceLimits) -> Result<()> {
    if spec.cost.worker_slots == 0 {
        return Err(BuildError::ResourceExceeded {
            task: spec.id.clone(),
            msg: "worker_cost must be at least 1".to_string(),
        });
    }
    if !limits.admits(spec.cost) {
        return Err(BuildError::ResourceExceeded {
            task: spec.id.clone(),
            msg: format!(
                "requests {} worker slots / {} MiB, ceiling is {} / {} MiB",
                spec.cost.worker_slots,
                spec.cost.memory_mb,
                limits.max_workers,
                limits.max_memory_mb
            ),
        });
    }
    Ok(())
}

fn within_limits(ledger: &ResourceLedger) -> bool {
    let usage = ledger.usage();
    let limits = ledger.limits();
    usage.workers_in_use <= limits.max_workers
        && usage.memory_in_use_mb <= limits.max_memory_mb
        && usage.tasks_in_use <= limits.max_concurrent_tasks
}
