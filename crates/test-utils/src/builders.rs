#![allow(dead_code)]

use std::time::Duration;

use parbuild::dag::{TaskCommand, TaskSpec};
use parbuild::types::ResourceCost;

/// Builder for `TaskSpec` to simplify test setup.
///
/// Defaults: command `true`, one worker slot, no memory, no dependencies.
pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            spec: TaskSpec::new(id, TaskCommand::Shell("true".to_string())),
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.spec.command = TaskCommand::Shell(cmd.to_string());
        self
    }

    pub fn argv(mut self, argv: &[&str]) -> Self {
        self.spec.command = TaskCommand::Argv(argv.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.spec.name = name.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.spec.deps.push(dep.to_string());
        self
    }

    pub fn workers(mut self, slots: u32) -> Self {
        self.spec.cost.worker_slots = slots;
        self
    }

    pub fn memory_mb(mut self, mb: u64) -> Self {
        self.spec.cost.memory_mb = mb;
        self
    }

    pub fn cost(mut self, slots: u32, mb: u64) -> Self {
        self.spec.cost = ResourceCost::new(slots, mb);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.spec.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = Some(timeout);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.spec.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }
}

/// Shorthand: `task("B", &["A"])`.
pub fn task(id: &str, deps: &[&str]) -> TaskSpec {
    deps.iter()
        .fold(TaskSpecBuilder::new(id), |b, dep| b.after(dep))
        .build()
}
