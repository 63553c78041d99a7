#![allow(dead_code)]

pub use parbuild_test_utils::builders::{TaskSpecBuilder, task};
pub use parbuild_test_utils::fake_executor::{FakeBehaviour, FakeExecutor};
pub use parbuild_test_utils::{init_tracing, with_timeout};

use parbuild::engine::{BuildScheduler, ResourceLimits};

/// Scheduler over a fake executor with `workers` slots and plenty of memory.
pub fn fake_scheduler(workers: u32, executor: FakeExecutor) -> BuildScheduler<FakeExecutor> {
    BuildScheduler::new(ResourceLimits::new(workers, 1 << 20), executor)
}
