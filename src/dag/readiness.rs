// src/dag/readiness.rs

//! Readiness evaluation: which pending tasks may run now, and which can
//! never run.

use std::collections::HashMap;

use crate::dag::registry::TaskRegistry;
use crate::dag::task::TaskRecord;
use crate::engine::ledger::ResourceLedger;
use crate::types::{TaskId, TaskStatus};

/// `Pending` tasks whose dependencies are all `Completed` and whose cost
/// fits the ledger's free capacity right now.
///
/// Ordered by ascending priority, then registration order, so dispatch is
/// reproducible for identical inputs. Each candidate is checked against the
/// current free capacity on its own; the caller still has to reserve them
/// one by one and may find later ones no longer fit.
pub fn eligible_tasks(registry: &TaskRegistry, ledger: &ResourceLedger) -> Vec<TaskRecord> {
    ready_tasks(registry)
        .into_iter()
        .filter(|record| ledger.fits(record.spec.cost))
        .collect()
}

/// `Pending` tasks whose dependencies are all `Completed`, regardless of
/// capacity, in dispatch order.
pub fn ready_tasks(registry: &TaskRegistry) -> Vec<TaskRecord> {
    let records = registry.all();
    let status: HashMap<&str, TaskStatus> =
        records.iter().map(|r| (r.id(), r.status)).collect();

    let mut ready: Vec<TaskRecord> = records
        .iter()
        .filter(|r| r.status == TaskStatus::Pending)
        .filter(|r| {
            r.spec
                .deps
                .iter()
                .all(|dep| status.get(dep.as_str()) == Some(&TaskStatus::Completed))
        })
        .cloned()
        .collect();

    ready.sort_by_key(|r| (r.spec.priority, r.seq));
    ready
}

/// `Pending` tasks with at least one direct dependency in `Failed`, paired
/// with that dependency.
///
/// Applying this repeatedly (failing the returned tasks each time) reaches
/// every transitive dependent of a failed task.
pub fn blocked_tasks(registry: &TaskRegistry) -> Vec<(TaskId, TaskId)> {
    let records = registry.all();
    let status: HashMap<&str, TaskStatus> =
        records.iter().map(|r| (r.id(), r.status)).collect();

    records
        .iter()
        .filter(|r| r.status == TaskStatus::Pending)
        .filter_map(|r| {
            r.spec
                .deps
                .iter()
                .find(|dep| status.get(dep.as_str()) == Some(&TaskStatus::Failed))
                .map(|dep| (r.spec.id.clone(), dep.clone()))
        })
        .collect()
}
