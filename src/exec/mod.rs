// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `ProcessBackend` built on `tokio::process::Command`.
//! - [`task_runner`] is the execution unit: one task, start to terminal
//!   state, with guaranteed resource release.
//! - [`output`] keeps the bounded tail of a child's stdout/stderr.

pub mod backend;
pub mod output;
pub mod task_runner;

pub use backend::{
    ExecOutcome, ExecutionResult, ExecutorBackend, ProcessBackend, parallelism_env,
};
pub use task_runner::{UnitContext, classify, start_unit};
