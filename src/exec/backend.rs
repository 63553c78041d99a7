// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! Execution units talk to an `ExecutorBackend` instead of spawning
//! processes directly. Production uses [`ProcessBackend`]; tests swap in a
//! fake that scripts outcomes and durations without touching the OS.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, TaskCommand};
use crate::engine::abort::AbortSignal;
use crate::exec::output::capture;

/// Default cap on captured stdout/stderr per stream.
pub const DEFAULT_OUTPUT_LIMIT: usize = 64 * 1024;

const KILL_CAPTURE_GRACE: Duration = Duration::from_millis(500);

/// How the command ended, as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Process exited; `-1` when it was terminated by a signal.
    Exited(i32),
    /// The process could not be started.
    LaunchFailed(String),
    /// The per-task timeout expired; the process was killed.
    TimedOut,
    /// The run was aborted with kill; the process was killed.
    Killed,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub outcome: ExecOutcome,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn new(outcome: ExecOutcome) -> Self {
        Self {
            outcome,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Trait abstracting how a scheduled task's command is executed.
pub trait ExecutorBackend: Send + Sync + 'static {
    /// Run `task` to completion and classify the result.
    ///
    /// Implementations must honour `task.timeout` and resolve promptly with
    /// [`ExecOutcome::Killed`] once `abort` asks for in-flight tasks to be
    /// killed.
    fn execute(
        &self,
        task: ScheduledTask,
        abort: AbortSignal,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + '_>>;
}

/// Production backend: spawns the task's command as a child process.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    output_limit: usize,
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self {
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorBackend for ProcessBackend {
    fn execute(
        &self,
        task: ScheduledTask,
        abort: AbortSignal,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + '_>> {
        Box::pin(run_process(task, abort, self.output_limit))
    }
}

/// Environment hints injected when a task is granted more than one worker
/// slot. Advisory only: the command decides whether to honour them.
pub fn parallelism_env(worker_slots: u32) -> Vec<(String, String)> {
    if worker_slots <= 1 {
        return Vec::new();
    }
    vec![
        ("MAKEFLAGS".to_string(), format!("-j{worker_slots}")),
        ("OMP_NUM_THREADS".to_string(), worker_slots.to_string()),
        ("PARBUILD_JOBS".to_string(), worker_slots.to_string()),
    ]
}

fn build_command(task: &ScheduledTask) -> Result<Command, String> {
    let mut cmd = match &task.command {
        TaskCommand::Shell(line) => {
            if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(line);
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c").arg(line);
                c
            }
        }
        TaskCommand::Argv(argv) => {
            let (program, args) = argv
                .split_first()
                .ok_or_else(|| "empty argv".to_string())?;
            let mut c = Command::new(program);
            c.args(args);
            c
        }
    };

    cmd.envs(task.env.iter());
    cmd.envs(parallelism_env(task.cost.worker_slots));
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a kill reaches everything the command spawned.
    #[cfg(unix)]
    cmd.process_group(0);
    Ok(cmd)
}

async fn run_process(task: ScheduledTask, mut abort: AbortSignal, limit: usize) -> ExecutionResult {
    let mut cmd = match build_command(&task) {
        Ok(cmd) => cmd,
        Err(msg) => return ExecutionResult::new(ExecOutcome::LaunchFailed(msg)),
    };

    info!(
        task = %task.id,
        cmd = %task.command,
        worker_slots = task.cost.worker_slots,
        memory_mb = task.cost.memory_mb,
        "starting task process"
    );

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(task = %task.id, error = %e, "failed to spawn task process");
            return ExecutionResult::new(ExecOutcome::LaunchFailed(e.to_string()));
        }
    };

    // Drain both pipes concurrently so a chatty child never blocks on a full
    // pipe buffer.
    let stdout = child.stdout.take().map(|s| tokio::spawn(capture(s, limit)));
    let stderr = child.stderr.take().map(|s| tokio::spawn(capture(s, limit)));

    let timeout = async {
        match task.timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                info!(
                    task = %task.id,
                    exit_code = code,
                    success = status.success(),
                    "task process exited"
                );
                ExecOutcome::Exited(code)
            }
            Err(e) => ExecOutcome::LaunchFailed(format!("waiting for process: {e}")),
        },
        _ = timeout => {
            warn!(task = %task.id, timeout = ?task.timeout, "task timed out; killing process");
            kill_child(&task, &mut child).await;
            ExecOutcome::TimedOut
        }
        _ = abort.killed() => {
            info!(task = %task.id, "run aborted; killing process");
            kill_child(&task, &mut child).await;
            ExecOutcome::Killed
        }
    };

    // A killed shell may leave grandchildren holding the pipes open; do not
    // wait on them for long.
    let grace = match outcome {
        ExecOutcome::TimedOut | ExecOutcome::Killed => Some(KILL_CAPTURE_GRACE),
        _ => None,
    };

    ExecutionResult {
        outcome,
        stdout: join_capture(stdout, grace).await,
        stderr: join_capture(stderr, grace).await,
    }
}

async fn kill_child(task: &ScheduledTask, child: &mut tokio::process::Child) {
    kill_process_group(task, child.id());
    if let Err(e) = child.kill().await {
        warn!(task = %task.id, error = %e, "failed to kill child process");
    }
}

#[cfg(unix)]
fn kill_process_group(task: &ScheduledTask, pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal. The group was created for this
    // child by `process_group(0)` and the child is not reaped yet, so the id
    // cannot have been reused.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        debug!(task = %task.id, pgid, error = %err, "failed to kill process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_task: &ScheduledTask, _pid: Option<u32>) {}

async fn join_capture(handle: Option<JoinHandle<String>>, grace: Option<Duration>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };

    let joined = match grace {
        Some(grace) => match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return String::new();
            }
        },
        None => handle.await,
    };

    joined.unwrap_or_else(|e| {
        debug!(error = %e, "output capture task failed");
        String::new()
    })
}
