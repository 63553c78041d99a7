use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use proptest::prelude::*;
use parbuild::dag::TaskSpec;
use parbuild::engine::{BuildScheduler, ResourceLimits};
use parbuild::types::{FailureReason, TaskStatus};
use parbuild_test_utils::builders::TaskSpecBuilder;
use parbuild_test_utils::fake_executor::{FakeBehaviour, FakeExecutor};

const MAX_WORKERS: u32 = 4;
const MAX_MEMORY_MB: u64 = 1024;

#[derive(Debug, Clone)]
struct GeneratedTask {
    deps: BTreeSet<usize>,
    workers: u32,
    memory_mb: u64,
    priority: i32,
    millis: u64,
    fails: bool,
}

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<GeneratedTask>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            (
                proptest::collection::vec(any::<usize>(), 0..3),
                1..=MAX_WORKERS,
                0..=MAX_MEMORY_MB,
                -2..3i32,
                1..8u64,
                proptest::bool::weighted(0.2),
            ),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (deps, workers, memory_mb, priority, millis, fails))| GeneratedTask {
                    deps: if i == 0 {
                        BTreeSet::new()
                    } else {
                        deps.into_iter().map(|d| d % i).collect()
                    },
                    workers,
                    memory_mb,
                    priority,
                    millis,
                    fails,
                })
                .collect()
        })
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn specs(tasks: &[GeneratedTask]) -> Vec<TaskSpec> {
    tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            t.deps
                .iter()
                .fold(TaskSpecBuilder::new(&name(i)), |b, d| b.after(&name(*d)))
                .cost(t.workers, t.memory_mb)
                .priority(t.priority)
                .build()
        })
        .collect()
}

fn executor(tasks: &[GeneratedTask]) -> FakeExecutor {
    tasks.iter().enumerate().fold(FakeExecutor::new(), |ex, (i, t)| {
        let behaviour = if t.fails {
            FakeBehaviour::fail(1)
        } else {
            FakeBehaviour::succeed(Duration::from_millis(t.millis))
        };
        ex.script(&name(i), behaviour)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// For any acyclic graph, costs within the ceilings and any set of
    /// failing tasks, the run terminates with every task terminal, never
    /// exceeds a ceiling, never starts a task before its dependencies
    /// completed, and never starts a task twice.
    #[test]
    fn scheduler_invariants_hold(tasks in dag_strategy(12)) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let fake = executor(&tasks);
        let scheduler = BuildScheduler::new(
            ResourceLimits::new(MAX_WORKERS, MAX_MEMORY_MB),
            fake.clone(),
        );
        scheduler.add_tasks(specs(&tasks)).unwrap();

        let report = rt
            .block_on(async {
                tokio::time::timeout(Duration::from_secs(20), scheduler.run()).await
            })
            .expect("run did not terminate")
            .unwrap();

        // Termination: every task is terminal.
        prop_assert_eq!(report.total, tasks.len());
        prop_assert_eq!(report.completed + report.failed, tasks.len());
        prop_assert!(scheduler.registry().all_terminal());

        // Resource safety.
        prop_assert!(fake.max_concurrent_workers() <= MAX_WORKERS);
        prop_assert!(fake.max_concurrent_memory_mb() <= MAX_MEMORY_MB);
        prop_assert!(fake.max_concurrent_tasks() <= MAX_WORKERS as usize);

        // Release exactly once.
        let stats = scheduler.ledger().stats();
        prop_assert_eq!(stats.reservations, stats.releases);
        prop_assert_eq!(stats.reservations as usize, fake.started().len());

        // No double dispatch.
        let started = fake.started();
        let unique: BTreeSet<&String> = started.iter().collect();
        prop_assert_eq!(unique.len(), started.len());
        prop_assert!(fake.double_dispatches().is_empty());

        // Dependency correctness and failure propagation.
        let executions: HashMap<String, _> = fake
            .executions()
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        for (i, t) in tasks.iter().enumerate() {
            let entry = report.task(&name(i)).unwrap();
            let deps_ok = t
                .deps
                .iter()
                .all(|d| report.task(&name(*d)).unwrap().status == TaskStatus::Completed);

            if let Some(exec) = executions.get(&name(i)) {
                prop_assert!(deps_ok, "{} ran with a failed dependency", name(i));
                for d in &t.deps {
                    let dep = &executions[&name(*d)];
                    prop_assert!(exec.started >= dep.finished);
                }
                let expected = if t.fails { TaskStatus::Failed } else { TaskStatus::Completed };
                prop_assert_eq!(entry.status, expected);
            } else {
                prop_assert!(!deps_ok, "{} never ran although its dependencies completed", name(i));
                prop_assert_eq!(entry.status, TaskStatus::Failed);
                let blocked = matches!(
                    entry.failure,
                    Some(FailureReason::BlockedByDependency { .. })
                );
                prop_assert!(blocked);
            }
        }
    }
}
