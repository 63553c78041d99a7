// tests/process_backend.rs
//
// These tests spawn real processes through `sh`.
#![cfg(unix)]

mod common;
use crate::common::{TaskSpecBuilder, init_tracing, with_timeout};

use std::error::Error;
use std::time::{Duration, Instant};

use parbuild::engine::{AbortHandle, BuildScheduler, ResourceLimits};
use parbuild::exec::{ExecOutcome, ExecutorBackend, ProcessBackend};
use parbuild::dag::ScheduledTask;
use parbuild::types::{FailureReason, TaskStatus};

type TestResult = Result<(), Box<dyn Error>>;

fn process_scheduler(workers: u32) -> BuildScheduler<ProcessBackend> {
    BuildScheduler::new(ResourceLimits::new(workers, 1 << 20), ProcessBackend::new())
}

#[tokio::test]
async fn exit_codes_map_to_status() -> TestResult {
    init_tracing();

    let scheduler = process_scheduler(2);
    scheduler.add_tasks([
        TaskSpecBuilder::new("ok").cmd("echo hello; echo warn >&2").build(),
        TaskSpecBuilder::new("bad").cmd("echo broken >&2; exit 3").build(),
    ])?;

    let report = with_timeout(scheduler.run()).await?;

    let ok = report.task("ok").unwrap();
    assert_eq!(ok.status, TaskStatus::Completed);
    assert_eq!(ok.stdout, "hello\n");
    assert_eq!(ok.stderr, "warn\n");

    let bad = report.task("bad").unwrap();
    assert_eq!(bad.failure, Some(FailureReason::ExitCode { code: 3 }));
    assert!(bad.stderr.contains("broken"));
    assert!(report.render().contains("broken"));
    Ok(())
}

#[tokio::test]
async fn missing_program_is_a_launch_failure() -> TestResult {
    init_tracing();

    let scheduler = process_scheduler(1);
    scheduler.add_tasks([
        TaskSpecBuilder::new("ghost")
            .argv(&["/definitely/not/a/real/program-parbuild"])
            .build(),
        TaskSpecBuilder::new("dependent").after("ghost").build(),
    ])?;

    let report = with_timeout(scheduler.run()).await?;

    let ghost = report.task("ghost").unwrap();
    assert!(matches!(ghost.failure, Some(FailureReason::Launch { .. })));
    assert!(!ghost.stderr.is_empty());
    assert!(matches!(
        report.task("dependent").unwrap().failure,
        Some(FailureReason::BlockedByDependency { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn worker_slots_are_advertised_to_the_command() -> TestResult {
    init_tracing();

    let scheduler = process_scheduler(4);
    scheduler.add_tasks([
        TaskSpecBuilder::new("wide")
            .workers(4)
            .cmd(r#"test "$MAKEFLAGS" = "-j4" && test "$PARBUILD_JOBS" = "4""#)
            .build(),
        TaskSpecBuilder::new("narrow")
            .cmd(r#"test -z "$PARBUILD_JOBS""#)
            .after("wide")
            .build(),
    ])?;

    let report = with_timeout(scheduler.run()).await?;

    assert!(report.is_success(), "{}", report.render());
    Ok(())
}

#[tokio::test]
async fn task_env_is_applied() -> TestResult {
    init_tracing();

    let scheduler = process_scheduler(1);
    scheduler.add_task(
        TaskSpecBuilder::new("env")
            .env("PARBUILD_TEST_FLAVOUR", "minimal")
            .cmd(r#"printf '%s' "$PARBUILD_TEST_FLAVOUR""#)
            .build(),
    )?;

    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.task("env").unwrap().stdout, "minimal");
    Ok(())
}

#[tokio::test]
async fn timeout_kills_the_process() -> TestResult {
    init_tracing();

    let scheduler = process_scheduler(1);
    scheduler.add_task(
        TaskSpecBuilder::new("sleepy")
            .argv(&["sleep", "5"])
            .timeout(Duration::from_millis(100))
            .build(),
    )?;

    let started = Instant::now();
    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(
        report.task("sleepy").unwrap().failure,
        Some(FailureReason::Timeout)
    );
    assert!(started.elapsed() < Duration::from_secs(3));
    Ok(())
}

#[tokio::test]
async fn timeout_kills_the_whole_process_tree() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("late-marker");
    // The outer shell forks an inner shell, which outlives a kill aimed only
    // at its parent.
    let cmd = format!("sh -c 'sleep 1; touch {}'; true", marker.display());

    let scheduler = process_scheduler(1);
    scheduler.add_task(
        TaskSpecBuilder::new("tree")
            .cmd(&cmd)
            .timeout(Duration::from_millis(200))
            .build(),
    )?;

    let report = with_timeout(scheduler.run()).await?;
    assert_eq!(
        report.task("tree").unwrap().failure,
        Some(FailureReason::Timeout)
    );

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(
        !marker.exists(),
        "a process spawned by the task survived the timeout kill"
    );
    Ok(())
}

#[tokio::test]
async fn large_output_is_truncated_to_the_tail() -> TestResult {
    init_tracing();

    let backend = ProcessBackend::new().with_output_limit(100);
    let task = ScheduledTask::from_spec(
        &TaskSpecBuilder::new("chatty")
            .cmd("i=0; while [ $i -lt 500 ]; do echo line$i; i=$((i+1)); done")
            .build(),
        None,
    );

    let result = with_timeout(backend.execute(task, AbortHandle::new().signal())).await;

    assert_eq!(result.outcome, ExecOutcome::Exited(0));
    assert!(result.stdout.starts_with("[... "));
    assert!(result.stdout.contains("bytes truncated"));
    assert!(result.stdout.ends_with("line499\n"));
    Ok(())
}

#[tokio::test]
async fn abort_kill_reaches_the_process() -> TestResult {
    init_tracing();

    let backend = ProcessBackend::new();
    let abort = AbortHandle::new();
    let task = ScheduledTask::from_spec(
        &TaskSpecBuilder::new("forever").argv(&["sleep", "30"]).build(),
        None,
    );

    let handle = {
        let signal = abort.signal();
        tokio::spawn(async move { backend.execute(task, signal).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    abort.abort(true);

    let result = with_timeout(handle).await?;
    assert_eq!(result.outcome, ExecOutcome::Killed);
    Ok(())
}
