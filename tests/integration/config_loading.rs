// tests/integration/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use parbuild::config::{ConfigFile, load_and_validate, load_from_path};
use parbuild::dag::{DagGraph, TaskCommand};

const SAMPLE: &str = r#"
[scheduler]
max_workers = 4
max_memory_mb = 4096
task_timeout = "30m"
kill_on_abort = false

[[task]]
id = "prepare-host"
cmd = "./scripts/prepare-host.sh"

[[task]]
id = "toolchain"
name = "Cross toolchain"
argv = ["make", "toolchain"]
after = ["prepare-host"]
worker_cost = 4
memory_mb = 2048
timeout = "2h"

[[task]]
id = "rootfs"
cmd = "make rootfs"
after = ["toolchain"]
priority = -1
env = { ROOTFS_FLAVOUR = "minimal" }
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn sample_config_loads_with_defaults_applied() {
    let file = write_config(SAMPLE);
    let cfg = load_and_validate(file.path()).unwrap();

    let settings = cfg.scheduler();
    assert_eq!(settings.limits.max_workers, 4);
    assert_eq!(settings.limits.max_memory_mb, 4096);
    assert_eq!(settings.limits.max_concurrent_tasks, 4);
    assert_eq!(settings.default_timeout, Some(Duration::from_secs(30 * 60)));
    assert!(!settings.kill_on_abort);

    let ids: Vec<&str> = cfg.tasks().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["prepare-host", "toolchain", "rootfs"]);

    let prepare = &cfg.tasks()[0];
    assert_eq!(prepare.name, "prepare-host");
    assert_eq!(prepare.cost.worker_slots, 1);
    assert_eq!(prepare.cost.memory_mb, 1024);
    assert!(prepare.timeout.is_none());

    let toolchain = &cfg.tasks()[1];
    assert_eq!(toolchain.name, "Cross toolchain");
    assert_eq!(
        toolchain.command,
        TaskCommand::Argv(vec!["make".to_string(), "toolchain".to_string()])
    );
    assert_eq!(toolchain.cost.worker_slots, 4);
    assert_eq!(toolchain.timeout, Some(Duration::from_secs(2 * 60 * 60)));

    let rootfs = &cfg.tasks()[2];
    assert_eq!(rootfs.priority, -1);
    assert_eq!(rootfs.env.get("ROOTFS_FLAVOUR").map(String::as_str), Some("minimal"));
}

#[test]
fn topological_order_puts_dependencies_first() {
    let file = write_config(SAMPLE);
    let cfg = load_and_validate(file.path()).unwrap();

    let order = DagGraph::from_specs(cfg.tasks()).topological_order().unwrap();
    assert_eq!(order, vec!["prepare-host", "toolchain", "rootfs"]);
}

#[test]
fn pool_size_can_differ_from_worker_ceiling() {
    let file = write_config(
        r#"
[scheduler]
max_workers = 8
max_concurrent_tasks = 2

[[task]]
id = "a"
cmd = "true"
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.scheduler().limits.max_workers, 8);
    assert_eq!(cfg.scheduler().limits.max_concurrent_tasks, 2);
}

#[test]
fn overrides_on_raw_config_are_validated() {
    let file = write_config(SAMPLE);
    let mut raw = load_from_path(file.path()).unwrap();

    // Shrinking the ceiling below the toolchain's cost must fail validation.
    raw.scheduler.max_workers = Some(2);
    assert!(ConfigFile::try_from(raw).is_err());
}
