// tests/integration/error_handling.rs

use std::io::Write;
use tempfile::NamedTempFile;
use parbuild::config::load_and_validate;
use parbuild::errors::BuildError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    let file = config_file(
        r#"
[[task]]
id = "A"
cmd = "echo A"
after = ["B"]

[[task]]
id = "B"
cmd = "echo B"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::CyclicDependency(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("A") || msg.contains("B"));
        }
        Err(e) => panic!("Expected CyclicDependency error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let file = config_file(
        r#"
[[task]]
id = "A"
cmd = "echo A"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::CyclicDependency(msg)) => assert!(msg.contains("itself")),
        other => panic!("Expected CyclicDependency, got: {:?}", other),
    }
}

#[test]
fn test_unknown_dependency_returns_config_error() {
    let file = config_file(
        r#"
[[task]]
id = "A"
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_duplicate_task_id_is_rejected() {
    let file = config_file(
        r#"
[[task]]
id = "compile"
cmd = "make"

[[task]]
id = "compile"
cmd = "make again"
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::DuplicateTask(id)) => assert_eq!(id, "compile"),
        other => panic!("Expected DuplicateTask, got: {:?}", other),
    }
}

#[test]
fn test_cost_above_ceiling_is_resource_exceeded() {
    let file = config_file(
        r#"
[scheduler]
max_workers = 4

[[task]]
id = "kernel"
cmd = "make -j8"
worker_cost = 8
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::ResourceExceeded { task, msg }) => {
            assert_eq!(task, "kernel");
            assert!(msg.contains("8 worker slots"));
        }
        other => panic!("Expected ResourceExceeded, got: {:?}", other),
    }
}

#[test]
fn test_memory_above_ceiling_is_resource_exceeded() {
    let file = config_file(
        r#"
[scheduler]
max_workers = 4
max_memory_mb = 512

[[task]]
id = "link"
cmd = "ld"
memory_mb = 4096
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(BuildError::ResourceExceeded { .. })
    ));
}

#[test]
fn test_cmd_and_argv_are_mutually_exclusive() {
    let file = config_file(
        r#"
[[task]]
id = "A"
cmd = "echo A"
argv = ["echo", "A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::ConfigError(msg)) => assert!(msg.contains("both")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_missing_command_is_config_error() {
    let file = config_file(
        r#"
[[task]]
id = "A"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(BuildError::ConfigError(_))
    ));
}

#[test]
fn test_zero_worker_cost_is_config_error() {
    let file = config_file(
        r#"
[[task]]
id = "A"
cmd = "true"
worker_cost = 0
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::ConfigError(msg)) => assert!(msg.contains("worker_cost")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_zero_max_workers_is_config_error() {
    let file = config_file(
        r#"
[scheduler]
max_workers = 0

[[task]]
id = "A"
cmd = "true"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(BuildError::ConfigError(_))
    ));
}

#[test]
fn test_bad_timeout_is_config_error() {
    let file = config_file(
        r#"
[[task]]
id = "A"
cmd = "true"
timeout = "soon"
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::ConfigError(msg)) => assert!(msg.contains("task 'A' timeout")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_empty_config_is_rejected() {
    let file = config_file("[scheduler]\nmax_workers = 2\n");

    match load_and_validate(file.path()) {
        Err(BuildError::ConfigError(msg)) => assert!(msg.contains("at least one")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_unknown_field_is_toml_error() {
    let file = config_file(
        r#"
[[task]]
id = "A"
cmd = "true"
depends_on = ["B"]
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(BuildError::TomlError(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Parbuild.toml");

    assert!(matches!(
        load_and_validate(&missing),
        Err(BuildError::IoError(_))
    ));
}
