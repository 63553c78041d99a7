use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use parbuild::dag::ScheduledTask;
use parbuild::engine::AbortSignal;
use parbuild::exec::{ExecOutcome, ExecutionResult, ExecutorBackend};

/// What a fake task does when executed.
#[derive(Debug, Clone)]
pub struct FakeBehaviour {
    pub duration: Duration,
    pub outcome: ExecOutcome,
    pub stdout: String,
    pub stderr: String,
}

impl FakeBehaviour {
    pub fn succeed(duration: Duration) -> Self {
        Self {
            duration,
            outcome: ExecOutcome::Exited(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32) -> Self {
        Self {
            duration: Duration::from_millis(5),
            outcome: ExecOutcome::Exited(code),
            stdout: String::new(),
            stderr: format!("fake failure with code {code}"),
        }
    }

    pub fn launch_error(msg: &str) -> Self {
        Self {
            duration: Duration::ZERO,
            outcome: ExecOutcome::LaunchFailed(msg.to_string()),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Never finishes on its own; only a timeout or a kill ends it.
    pub fn hang() -> Self {
        Self::succeed(Duration::from_secs(3600))
    }
}

/// One execution as observed by the fake.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub started: Instant,
    pub finished: Instant,
    pub worker_slots: u32,
    pub memory_mb: u64,
}

#[derive(Debug, Default)]
struct Tracker {
    started: Vec<String>,
    executions: Vec<Execution>,
    running: HashMap<String, (u32, u64)>,
    max_tasks: usize,
    max_workers: u32,
    max_memory_mb: u64,
    double_dispatch: Vec<String>,
}

/// A fake executor that:
/// - records which tasks were started, and in what order
/// - tracks peak concurrent task count, worker slots and memory
/// - sleeps for a scripted duration and reports a scripted outcome
///   (success after a few milliseconds unless told otherwise)
/// - honours per-task timeouts and kill-on-abort like the real backend
#[derive(Clone, Default)]
pub struct FakeExecutor {
    script: Arc<Mutex<HashMap<String, FakeBehaviour>>>,
    default_duration: Duration,
    tracker: Arc<Mutex<Tracker>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            default_duration: Duration::from_millis(10),
            ..Default::default()
        }
    }

    pub fn with_default_duration(mut self, d: Duration) -> Self {
        self.default_duration = d;
        self
    }

    pub fn script(self, id: &str, behaviour: FakeBehaviour) -> Self {
        self.script.lock().unwrap().insert(id.to_string(), behaviour);
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.tracker.lock().unwrap().started.clone()
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.tracker.lock().unwrap().executions.clone()
    }

    pub fn execution(&self, id: &str) -> Option<Execution> {
        self.executions().into_iter().find(|e| e.id == id)
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.tracker.lock().unwrap().max_tasks
    }

    pub fn max_concurrent_workers(&self) -> u32 {
        self.tracker.lock().unwrap().max_workers
    }

    pub fn max_concurrent_memory_mb(&self) -> u64 {
        self.tracker.lock().unwrap().max_memory_mb
    }

    /// Task ids that were observed running twice at the same time.
    pub fn double_dispatches(&self) -> Vec<String> {
        self.tracker.lock().unwrap().double_dispatch.clone()
    }

    fn behaviour_for(&self, id: &str) -> FakeBehaviour {
        self.script
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_else(|| FakeBehaviour::succeed(self.default_duration))
    }

    fn on_start(&self, task: &ScheduledTask) {
        let mut t = self.tracker.lock().unwrap();
        t.started.push(task.id.clone());
        if t.running.contains_key(&task.id) {
            t.double_dispatch.push(task.id.clone());
        }
        t.running
            .insert(task.id.clone(), (task.cost.worker_slots, task.cost.memory_mb));
        let tasks = t.running.len();
        let workers: u32 = t.running.values().map(|(w, _)| *w).sum();
        let memory: u64 = t.running.values().map(|(_, m)| *m).sum();
        t.max_tasks = t.max_tasks.max(tasks);
        t.max_workers = t.max_workers.max(workers);
        t.max_memory_mb = t.max_memory_mb.max(memory);
    }

    fn on_finish(&self, task: &ScheduledTask, started: Instant) {
        let mut t = self.tracker.lock().unwrap();
        t.running.remove(&task.id);
        t.executions.push(Execution {
            id: task.id.clone(),
            started,
            finished: Instant::now(),
            worker_slots: task.cost.worker_slots,
            memory_mb: task.cost.memory_mb,
        });
    }
}

impl ExecutorBackend for FakeExecutor {
    fn execute(
        &self,
        task: ScheduledTask,
        mut abort: AbortSignal,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + '_>> {
        Box::pin(async move {
            let behaviour = self.behaviour_for(&task.id);
            let started = Instant::now();
            self.on_start(&task);

            let timeout = async {
                match task.timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending().await,
                }
            };

            let outcome = tokio::select! {
                _ = tokio::time::sleep(behaviour.duration) => behaviour.outcome.clone(),
                _ = timeout => ExecOutcome::TimedOut,
                _ = abort.killed() => ExecOutcome::Killed,
            };

            self.on_finish(&task, started);

            ExecutionResult {
                outcome,
                stdout: behaviour.stdout,
                stderr: behaviour.stderr,
            }
        })
    }
}
