// src/report/analyzer.rs

use tracing::{info, warn};

use crate::report::TaskRecordSummary;
use crate::types::TaskStatus;

/// External fault-analysis collaborator.
///
/// Receives the per-task records once the run is over. This is a one-way
/// notification; whatever the analyzer derives (risk scores etc.) is its
/// own business.
pub trait FaultAnalyzer: Send + Sync {
    fn analyze_parallel_build(&self, records: &[TaskRecordSummary]);
}

/// Analyzer that only logs what it was given: failed tasks and the slowest
/// few tasks of the run.
#[derive(Debug, Clone)]
pub struct LogFaultAnalyzer {
    top_n: usize,
}

impl LogFaultAnalyzer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }
}

impl Default for LogFaultAnalyzer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl FaultAnalyzer for LogFaultAnalyzer {
    fn analyze_parallel_build(&self, records: &[TaskRecordSummary]) {
        for r in records.iter().filter(|r| r.status == TaskStatus::Failed) {
            warn!(task = %r.task_id, duration_s = r.duration_seconds, "failed task");
        }

        let mut by_duration: Vec<&TaskRecordSummary> = records.iter().collect();
        by_duration.sort_by(|a, b| b.duration_seconds.total_cmp(&a.duration_seconds));
        for r in by_duration.into_iter().take(self.top_n) {
            info!(
                task = %r.task_id,
                status = %r.status,
                duration_s = r.duration_seconds,
                "slowest task"
            );
        }
    }
}
