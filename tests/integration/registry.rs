// tests/integration/registry.rs

use parbuild::dag::{Completion, TaskRegistry};
use parbuild::errors::BuildError;
use parbuild::types::{FailureReason, TaskStatus};
use parbuild_test_utils::builders::task;

#[test]
fn lifecycle_pending_running_completed() {
    let registry = TaskRegistry::new();
    registry.add(task("A", &[])).unwrap();
    assert_eq!(registry.status_of("A").unwrap(), TaskStatus::Pending);

    let running = registry.mark_running("A").unwrap();
    assert_eq!(running.status, TaskStatus::Running);
    assert!(running.started_at.is_some());
    assert!(running.finished_at.is_none());

    let done = registry
        .finish("A", Completion::success("out".into(), String::new()))
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.stdout, "out");
    assert!(done.finished_at.is_some());
    assert!(registry.all_terminal());
}

#[test]
fn terminal_states_are_final() {
    let registry = TaskRegistry::new();
    registry.add(task("A", &[])).unwrap();
    registry.mark_running("A").unwrap();
    registry
        .finish(
            "A",
            Completion::failure(FailureReason::ExitCode { code: 1 }, String::new(), String::new()),
        )
        .unwrap();

    for next in [TaskStatus::Pending, TaskStatus::Running, TaskStatus::Completed] {
        match registry.set_status("A", next) {
            Err(BuildError::InvalidTransition { task, from, to }) => {
                assert_eq!(task, "A");
                assert_eq!(from, TaskStatus::Failed);
                assert_eq!(to, next);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }
    assert_eq!(registry.status_of("A").unwrap(), TaskStatus::Failed);
}

#[test]
fn running_cannot_be_dispatched_twice() {
    let registry = TaskRegistry::new();
    registry.add(task("A", &[])).unwrap();
    registry.mark_running("A").unwrap();

    assert!(matches!(
        registry.mark_running("A"),
        Err(BuildError::InvalidTransition { .. })
    ));
    assert!(matches!(
        registry.fail_pending("A", FailureReason::Aborted),
        Err(BuildError::InvalidTransition { .. })
    ));
}

#[test]
fn pending_completed_is_not_a_shortcut() {
    let registry = TaskRegistry::new();
    registry.add(task("A", &[])).unwrap();

    assert!(registry.set_status("A", TaskStatus::Completed).is_err());
    registry
        .fail_pending("A", FailureReason::BlockedByDependency { dependency: "X".into() })
        .unwrap();

    let record = registry.get("A").unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.started_at.is_none());
}

#[test]
fn duplicate_and_unknown_ids() {
    let registry = TaskRegistry::new();
    registry.add(task("A", &[])).unwrap();

    assert!(matches!(
        registry.add(task("A", &["B"])),
        Err(BuildError::DuplicateTask(id)) if id == "A"
    ));
    assert!(matches!(registry.get("nope"), Err(BuildError::UnknownTask(_))));
    assert!(matches!(
        registry.set_status("nope", TaskStatus::Running),
        Err(BuildError::UnknownTask(_))
    ));
    assert_eq!(registry.len(), 1);
}

#[test]
fn counts_and_registration_order() {
    let registry = TaskRegistry::new();
    for id in ["c", "a", "b"] {
        registry.add(task(id, &[])).unwrap();
    }
    registry.mark_running("a").unwrap();

    assert_eq!(registry.ids(), vec!["c", "a", "b"]);
    let counts = registry.counts();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.running, 1);
    assert_eq!(counts.total(), 3);
    assert!(!registry.all_terminal());
}
