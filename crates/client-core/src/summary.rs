use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::task::{TaskRecord, TaskStatus};

/// Counts derived from one task snapshot. Never updated incrementally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub completed: usize,
    pub success: usize,
    pub captcha: usize,
    pub failed: usize,
    pub total: usize,
}

impl RunSummary {
    /// Rounded completion percentage; an empty run reports 0.
    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.completed as f64 / self.total as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }

    pub fn is_settled(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Task Aggregator: derive every counter from one complete snapshot in a single pass.
pub fn summarize(tasks: &[TaskRecord]) -> RunSummary {
    let mut summary = RunSummary {
        total: tasks.len(),
        ..RunSummary::default()
    };
    for task in tasks {
        if !task.status.is_terminal() {
            continue;
        }
        summary.completed += 1;
        match task.status {
            TaskStatus::Ok => summary.success += 1,
            TaskStatus::Captcha => summary.captcha += 1,
            _ => summary.failed += 1,
        }
    }
    summary
}

/// Tasks that are terminal in `next` but were not terminal (or absent) in `prev`, in `next`
/// order.
pub fn newly_settled<'a>(prev: &[TaskRecord], next: &'a [TaskRecord]) -> Vec<&'a TaskRecord> {
    let settled_before: HashSet<(&str, &str)> = prev
        .iter()
        .filter(|t| t.status.is_terminal())
        .map(TaskRecord::key)
        .collect();

    next.iter()
        .filter(|t| t.status.is_terminal() && !settled_before.contains(&t.key()))
        .collect()
}
