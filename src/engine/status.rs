// src/engine/status.rs

//! Live run status, for progress displays that poll during a run.

use std::sync::Arc;

use serde::Serialize;

use crate::dag::TaskRegistry;
use crate::engine::ledger::ResourceLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
    pub pending: usize,
    pub worker_usage: u32,
    pub max_workers: u32,
    pub memory_usage_mb: u64,
    pub max_memory_mb: u64,
}

/// Cheap, cloneable handle that can query status from any task or thread
/// while the scheduler is running.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    registry: Arc<TaskRegistry>,
    ledger: Arc<ResourceLedger>,
}

impl StatusHandle {
    pub fn new(registry: Arc<TaskRegistry>, ledger: Arc<ResourceLedger>) -> Self {
        Self { registry, ledger }
    }

    pub fn get_run_status(&self) -> RunStatus {
        let counts = self.registry.counts();
        let usage = self.ledger.usage();
        let limits = self.ledger.limits();
        RunStatus {
            total: counts.total(),
            completed: counts.completed,
            failed: counts.failed,
            running: counts.running,
            pending: counts.pending,
            worker_usage: usage.workers_in_use,
            max_workers: limits.max_workers,
            memory_usage_mb: usage.memory_in_use_mb,
            max_memory_mb: limits.max_memory_mb,
        }
    }
}
