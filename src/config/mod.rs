// src/config/mod.rs

//! Task-graph configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a task-graph file from disk (`loader.rs`).
//! - Validate it into task descriptors the scheduler accepts (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ConfigFile, RawConfigFile, SchedulerSection, SchedulerSettings, TaskConfig,
};
