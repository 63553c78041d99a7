// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile, SchedulerSettings, TaskConfig};
use crate::dag::{DagGraph, TaskCommand, TaskSpec};
use crate::engine::ResourceLimits;
use crate::errors::{BuildError, Result};
use crate::types::ResourceCost;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let scheduler = resolve_scheduler(&raw)?;
        ensure_unique_ids(&raw)?;

        let tasks = raw
            .task
            .iter()
            .map(|tc| task_spec(tc, &scheduler.limits))
            .collect::<Result<Vec<_>>>()?;

        validate_task_dependencies(&tasks)?;
        DagGraph::from_specs(&tasks).validate()?;

        Ok(ConfigFile::new_unchecked(scheduler, tasks))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(BuildError::ConfigError(
            "config must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn resolve_scheduler(cfg: &RawConfigFile) -> Result<SchedulerSettings> {
    let section = &cfg.scheduler;

    let max_workers = section
        .max_workers
        .unwrap_or_else(|| ResourceLimits::default().max_workers);
    if max_workers == 0 {
        return Err(BuildError::ConfigError(
            "[scheduler].max_workers must be >= 1 (got 0)".to_string(),
        ));
    }

    let mut limits = ResourceLimits::new(max_workers, section.max_memory_mb);
    if let Some(n) = section.max_concurrent_tasks {
        if n == 0 {
            return Err(BuildError::ConfigError(
                "[scheduler].max_concurrent_tasks must be >= 1 (got 0)".to_string(),
            ));
        }
        limits = limits.with_max_concurrent_tasks(n);
    }

    let default_timeout = section
        .task_timeout
        .as_deref()
        .map(|s| parse_timeout(s, "[scheduler].task_timeout"))
        .transpose()?;

    Ok(SchedulerSettings {
        limits,
        default_timeout,
        kill_on_abort: section.kill_on_abort,
        output_limit_bytes: section.output_limit_bytes,
    })
}

fn ensure_unique_ids(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in &cfg.task {
        if task.id.trim().is_empty() {
            return Err(BuildError::ConfigError(
                "task id must not be empty".to_string(),
            ));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(BuildError::DuplicateTask(task.id.clone()));
        }
    }
    Ok(())
}

fn task_spec(tc: &TaskConfig, limits: &ResourceLimits) -> Result<TaskSpec> {
    let command = match (&tc.cmd, &tc.argv) {
        (Some(cmd), None) if !cmd.trim().is_empty() => TaskCommand::Shell(cmd.clone()),
        (None, Some(argv)) if !argv.is_empty() => TaskCommand::Argv(argv.clone()),
        (Some(_), Some(_)) => {
            return Err(BuildError::ConfigError(format!(
                "task '{}' sets both `cmd` and `argv`",
                tc.id
            )));
        }
        _ => {
            return Err(BuildError::ConfigError(format!(
                "task '{}' needs a non-empty `cmd` or `argv`",
                tc.id
            )));
        }
    };

    if tc.worker_cost == 0 {
        return Err(BuildError::ConfigError(format!(
            "task '{}' has worker_cost 0; it must be >= 1",
            tc.id
        )));
    }

    let cost = ResourceCost::new(tc.worker_cost, tc.memory_mb);
    if !limits.admits(cost) {
        return Err(BuildError::ResourceExceeded {
            task: tc.id.clone(),
            msg: format!(
                "requests {} worker slots / {} MiB, ceiling is {} / {} MiB",
                cost.worker_slots, cost.memory_mb, limits.max_workers, limits.max_memory_mb
            ),
        });
    }

    let timeout = tc
        .timeout
        .as_deref()
        .map(|s| parse_timeout(s, &format!("task '{}' timeout", tc.id)))
        .transpose()?;

    Ok(TaskSpec {
        id: tc.id.clone(),
        name: tc.name.clone().unwrap_or_else(|| tc.id.clone()),
        command,
        deps: tc.after.clone(),
        cost,
        priority: tc.priority,
        timeout,
        env: tc.env.clone(),
    })
}

fn validate_task_dependencies(tasks: &[TaskSpec]) -> Result<()> {
    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    for task in tasks {
        for dep in &task.deps {
            if dep == &task.id {
                return Err(BuildError::CyclicDependency(format!(
                    "task '{}' cannot depend on itself in `after`",
                    task.id
                )));
            }
            if !ids.contains(dep.as_str()) {
                return Err(BuildError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    task.id, dep
                )));
            }
        }
    }
    Ok(())
}

fn parse_timeout(s: &str, what: &str) -> Result<Duration> {
    let d = parse_duration(s).map_err(|e| BuildError::ConfigError(format!("{what}: {e}")))?;
    if d.is_zero() {
        return Err(BuildError::ConfigError(format!("{what}: must be > 0")));
    }
    Ok(d)
}
