// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the resource ledger (what capacity is in use)
//! - the scheduling loop that dispatches eligible tasks to execution units
//! - the abort signal and live status query used by outer layers
//!
//! The loop itself lives in [`scheduler`]; execution units report back to
//! it through [`RunEvent`]s.

use crate::types::{TaskId, TaskStatus};

/// Events flowing from execution units back into the scheduling loop.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A task reached a terminal state and released its resources.
    TaskFinished { id: TaskId, status: TaskStatus },
}

pub mod abort;
pub mod ledger;
pub mod observer;
pub mod scheduler;
pub mod status;

pub use abort::{AbortHandle, AbortMode, AbortSignal};
pub use ledger::{LedgerStats, LedgerUsage, Reservation, ResourceLedger, ResourceLimits};
pub use observer::RunObserver;
pub use scheduler::{BuildScheduler, RunOptions};
pub use status::{RunStatus, StatusHandle};
