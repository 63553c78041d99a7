// src/dag/mod.rs

//! Task graph representation.
//!
//! - [`task`] holds task descriptors, run records and the dispatch payload.
//! - [`registry`] is the shared, lock-guarded set of tasks and their status.
//! - [`graph`] keeps dependency adjacency and performs the cycle check.
//! - [`readiness`] decides which pending tasks are eligible, and which are
//!   blocked forever by a failed dependency.

pub mod graph;
pub mod readiness;
pub mod registry;
pub mod task;

pub use graph::DagGraph;
pub use readiness::{blocked_tasks, eligible_tasks, ready_tasks};
pub use registry::{Completion, StatusCounts, TaskRegistry};
pub use task::{ScheduledTask, TaskCommand, TaskRecord, TaskSpec};
