// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::TaskSpec;
use crate::engine::ResourceLimits;

/// Top-level task-graph file as read from TOML.
///
/// ```toml
/// [scheduler]
/// max_workers = 4
/// max_memory_mb = 8192
///
/// [[task]]
/// id = "prepare-host"
/// cmd = "./scripts/prepare-host.sh"
///
/// [[task]]
/// id = "toolchain"
/// cmd = "make toolchain"
/// after = ["prepare-host"]
/// worker_cost = 4
/// memory_mb = 2048
/// ```
///
/// File order of `[[task]]` entries is registration order, the final
/// dispatch tie-break.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    /// Worker-slot ceiling; defaults to the number of CPUs.
    #[serde(default)]
    pub max_workers: Option<u32>,

    /// Worker pool size (tasks running at once); defaults to `max_workers`.
    #[serde(default)]
    pub max_concurrent_tasks: Option<usize>,

    /// Memory ceiling in MiB.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,

    /// Default per-task timeout, e.g. `"30m"`.
    #[serde(default)]
    pub task_timeout: Option<String>,

    /// On abort, kill in-flight tasks (`true`) or let them finish.
    #[serde(default = "default_kill_on_abort")]
    pub kill_on_abort: bool,

    /// Cap on captured stdout/stderr per task and stream.
    #[serde(default = "default_output_limit_bytes")]
    pub output_limit_bytes: usize,
}

fn default_max_memory_mb() -> u64 {
    8192
}

fn default_kill_on_abort() -> bool {
    true
}

fn default_output_limit_bytes() -> usize {
    crate::exec::backend::DEFAULT_OUTPUT_LIMIT
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_workers: None,
            max_concurrent_tasks: None,
            max_memory_mb: default_max_memory_mb(),
            task_timeout: None,
            kill_on_abort: default_kill_on_abort(),
            output_limit_bytes: default_output_limit_bytes(),
        }
    }
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub id: String,

    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    /// Shell command line. Exactly one of `cmd` / `argv` must be set.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Program and arguments, exec'd without a shell.
    #[serde(default)]
    pub argv: Option<Vec<String>>,

    /// Ids of tasks that must complete first.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default = "default_worker_cost")]
    pub worker_cost: u32,

    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,

    /// Lower runs first when capacity is scarce.
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_worker_cost() -> u32 {
    1
}

fn default_memory_mb() -> u64 {
    1024
}

/// Resolved scheduler settings.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub limits: ResourceLimits,
    pub default_timeout: Option<Duration>,
    pub kill_on_abort: bool,
    pub output_limit_bytes: usize,
}

/// A validated task-graph file.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holding one means
/// ids are unique, dependencies resolve, the graph is acyclic and every
/// cost fits the ceilings.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    scheduler: SchedulerSettings,
    tasks: Vec<TaskSpec>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(scheduler: SchedulerSettings, tasks: Vec<TaskSpec>) -> Self {
        Self { scheduler, tasks }
    }

    pub fn scheduler(&self) -> &SchedulerSettings {
        &self.scheduler
    }

    /// Task descriptors in file order.
    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<TaskSpec> {
        self.tasks
    }
}
