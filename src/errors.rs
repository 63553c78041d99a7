// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Per-task failures (non-zero exit, launch failure, timeout, blocked
//! dependency, abort) are *not* errors at this level: they are recorded on
//! the task as a [`crate::types::FailureReason`] and the run keeps going.
//! Only registration, configuration and graph-shape problems surface here.

use thiserror::Error;

use crate::types::{TaskId, TaskStatus};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(TaskId),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("Task '{task}' exceeds resource limits: {msg}")]
    ResourceExceeded { task: TaskId, msg: String },

    #[error("Illegal status transition for task '{task}': {from:?} -> {to:?}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
