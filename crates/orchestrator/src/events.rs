//! Lifecycle events broadcast to subscribed agents and observers.

use modumind_common::{AgentRole, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    AgentRegistered {
        name: String,
        role: AgentRole,
        replaced: bool,
    },
    AgentDeregistered {
        name: String,
    },
    TaskCreated {
        task_id: TaskId,
    },
    /// The named agent should pick up the task.
    TaskAssigned {
        task_id: TaskId,
        agent: String,
    },
    RoutingFailed {
        task_id: TaskId,
    },
    TaskStatusChanged {
        task_id: TaskId,
        status: TaskStatus,
    },
}

impl OrchestratorEvent {
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            OrchestratorEvent::TaskCreated { task_id }
            | OrchestratorEvent::TaskAssigned { task_id, .. }
            | OrchestratorEvent::RoutingFailed { task_id }
            | OrchestratorEvent::TaskStatusChanged { task_id, .. } => Some(task_id),
            OrchestratorEvent::AgentRegistered { .. }
            | OrchestratorEvent::AgentDeregistered { .. } => None,
        }
    }
}
