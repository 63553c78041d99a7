// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, RawConfigFile, load_from_path};
use crate::dag::DagGraph;
use crate::engine::{BuildScheduler, RunOptions};
use crate::exec::ProcessBackend;
use crate::report::LogFaultAnalyzer;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task-graph loading (with CLI overrides)
/// - scheduler + process backend
/// - Ctrl-C handling (abort the run)
/// - summary output and the optional JSON report
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut raw = load_from_path(&config_path)
        .with_context(|| format!("loading task graph from {:?}", config_path))?;
    apply_overrides(&mut raw, &args);
    let cfg = ConfigFile::try_from(raw).context("validating task graph")?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let settings = *cfg.scheduler();
    let backend = ProcessBackend::new().with_output_limit(settings.output_limit_bytes);
    let scheduler = BuildScheduler::new(settings.limits, backend)
        .with_options(RunOptions {
            default_timeout: settings.default_timeout,
        })
        .with_fault_analyzer(Arc::new(LogFaultAnalyzer::default()));
    scheduler.add_tasks(cfg.into_tasks())?;

    // Ctrl-C -> abort the run.
    {
        let abort = scheduler.abort_handle();
        let kill = settings.kill_on_abort;
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            abort.abort(kill);
        });
    }

    info!(tasks = scheduler.registry().len(), "starting build");
    let report = scheduler.run().await?;

    print!("{}", report.render());

    if let Some(path) = &args.report {
        report.write_json(path)?;
        debug!(path = %path, "wrote run report");
    }

    if !report.is_success() {
        bail!("{} of {} tasks failed", report.failed, report.total);
    }
    Ok(())
}

/// CLI flags win over the `[scheduler]` section.
fn apply_overrides(raw: &mut RawConfigFile, args: &CliArgs) {
    let section = &mut raw.scheduler;
    if let Some(n) = args.max_workers {
        section.max_workers = Some(n);
    }
    if let Some(mb) = args.max_memory_mb {
        section.max_memory_mb = mb;
    }
    if let Some(n) = args.max_concurrent_tasks {
        section.max_concurrent_tasks = Some(n);
    }
    if let Some(t) = &args.task_timeout {
        section.task_timeout = Some(t.clone());
    }
}

/// Dry-run output: ceilings, then tasks in dependency order with costs.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let settings = cfg.scheduler();
    println!("parbuild dry-run");
    println!("  scheduler.max_workers = {}", settings.limits.max_workers);
    println!(
        "  scheduler.max_concurrent_tasks = {}",
        settings.limits.max_concurrent_tasks
    );
    println!("  scheduler.max_memory_mb = {}", settings.limits.max_memory_mb);
    if let Some(t) = settings.default_timeout {
        println!("  scheduler.task_timeout = {t:?}");
    }
    println!();

    let graph = DagGraph::from_specs(cfg.tasks());
    let order = graph.topological_order()?;

    println!("tasks ({}), in dependency order:", order.len());
    for id in order {
        let Some(task) = cfg.tasks().iter().find(|t| t.id == id) else {
            continue;
        };
        println!("  - {} ({})", task.id, task.name);
        println!("      cmd: {}", task.command);
        if !task.deps.is_empty() {
            println!("      after: {:?}", task.deps);
        }
        let downstream = graph.transitive_dependents(&task.id);
        if !downstream.is_empty() {
            println!("      blocks on failure: {} task(s)", downstream.len());
        }
        println!(
            "      cost: {} worker slots, {} MiB",
            task.cost.worker_slots, task.cost.memory_mb
        );
        if task.priority != 0 {
            println!("      priority: {}", task.priority);
        }
        if let Some(t) = task.timeout {
            println!("      timeout: {t:?}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
