//! Read-only status projection for dashboards.

use modumind_common::{AgentRole, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentActivity {
    Busy,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub name: String,
    pub role: AgentRole,
    pub capabilities: Vec<String>,
    pub activity: AgentActivity,
    /// Assigned or running tasks held by this agent
    pub active_tasks: usize,
}

/// Snapshot of registry and store contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub agents: Vec<AgentStatus>,
    /// Task count per status, every status present
    pub tasks: BTreeMap<String, usize>,
    pub total_tasks: usize,
    /// Created tasks that no agent holds yet
    pub unassigned_tasks: usize,
}

pub(crate) fn count_by_status(tasks: &[Task]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = TaskStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    for task in tasks {
        *counts.entry(task.status.as_str().to_string()).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use modumind_common::TaskContext;

    #[test]
    fn counts_include_every_status() {
        let mut running = Task::new("b", TaskContext::new());
        running.assign("executor").unwrap();
        running.advance(TaskStatus::Running).unwrap();
        let tasks = vec![Task::new("a", TaskContext::new()), running];

        let counts = count_by_status(&tasks);
        assert_eq!(counts.len(), 5);
        assert_eq!(counts["created"], 1);
        assert_eq!(counts["running"], 1);
        assert_eq!(counts["completed"], 0);
    }

    #[test]
    fn activity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&AgentActivity::Busy).unwrap(), "\"busy\"");
    }
}
