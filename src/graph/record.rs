// src/graph/record.rs

//! Ephemeral per-run execution record.

use std::collections::HashMap;

use crate::graph::node::TaskNode;

/// Status of one task within a single scheduler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Seeded at run start; never left this state (e.g. a series
    /// sibling after an earlier failure).
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

/// One record per `Scheduler::run` invocation, keyed by task name.
/// Owned exclusively by the scheduler for the duration of the run and
/// discarded on completion.
#[derive(Debug, Default)]
pub struct RunRecord {
    statuses: HashMap<String, TaskStatus>,
}

impl RunRecord {
    /// Seed the record with every node in the graph as `Pending`.
    pub fn seeded_from(root: &TaskNode) -> Self {
        let mut statuses = HashMap::new();
        root.visit(&mut |node| {
            statuses
                .entry(node.name.clone())
                .or_insert(TaskStatus::Pending);
        });
        Self { statuses }
    }

    pub fn set(&mut self, name: &str, status: TaskStatus) {
        self.statuses.insert(name.to_string(), status);
    }

    /// Counts of (succeeded, failed, never started) tasks, for the
    /// end-of-run log line.
    pub fn summary(&self) -> (usize, usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut pending = 0;
        for status in self.statuses.values() {
            match status {
                TaskStatus::Succeeded => succeeded += 1,
                TaskStatus::Failed(_) => failed += 1,
                TaskStatus::Pending | TaskStatus::Running => pending += 1,
            }
        }
        (succeeded, failed, pending)
    }
}
