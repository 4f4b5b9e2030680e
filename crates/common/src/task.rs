//! Task lifecycle types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-form task context. External collaborators (an ERP connector, a
/// dashboard) only ever reach the core through values placed here.
pub type TaskContext = serde_json::Map<String, serde_json::Value>;

/// Identifier of a task, unique for the lifetime of a task store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Allocate a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("task_{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Current status of a task.
///
/// Status only moves forward: `Created -> Assigned -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Created,
    Assigned,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Created,
        TaskStatus::Assigned,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Completed and failed tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Assigned or running: the task occupies its agent.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::Running)
    }

    /// Whether `next` directly follows `self` in the lifecycle.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (*self, next),
            (TaskStatus::Created, TaskStatus::Assigned)
                | (TaskStatus::Assigned, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown task status '{s}'"))
    }
}

/// A unit of work tracked by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,

    /// Human-readable task description
    pub description: String,

    /// Task-specific context
    #[serde(default)]
    pub context: TaskContext,

    /// Current status
    pub status: TaskStatus,

    /// Name of the assigned agent (if any)
    #[serde(default)]
    pub assigned_agent: Option<String>,

    /// Creation timestamp (Unix millis)
    pub created_at: u64,

    /// Last update timestamp (Unix millis)
    pub updated_at: u64,
}

impl Task {
    pub fn new(description: impl Into<String>, context: TaskContext) -> Self {
        let now = now_millis();

        Self {
            id: TaskId::generate(),
            description: description.into(),
            context,
            status: TaskStatus::Created,
            assigned_agent: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = now_millis().max(self.created_at);
    }

    /// Move to `next`, enforcing the forward-only lifecycle.
    pub fn advance(&mut self, next: TaskStatus) -> crate::Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(crate::ModumindError::InvalidTransition {
                task_id: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Record the handling agent and move `Created -> Assigned` in one step.
    pub fn assign(&mut self, agent: impl Into<String>) -> crate::Result<()> {
        if self.status != TaskStatus::Created {
            return Err(crate::ModumindError::InvalidState(format!(
                "task {} is {}, only created tasks can be assigned",
                self.id, self.status
            )));
        }
        self.assigned_agent = Some(agent.into());
        self.status = TaskStatus::Assigned;
        self.touch();
        Ok(())
    }
}

pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let mut context = TaskContext::new();
        context.insert("priority".into(), "high".into());
        let task = Task::new("Test task", context);

        assert!(task.id.as_str().starts_with("task_"));
        assert_eq!(task.description, "Test task");
        assert_eq!(task.status, TaskStatus::Created);
        assert!(task.assigned_agent.is_none());
        assert_eq!(task.context["priority"], "high");
        assert!(task.created_at > 0);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_task_unique_ids() {
        let task1 = Task::new("Task 1", TaskContext::new());
        let task2 = Task::new("Task 2", TaskContext::new());

        assert_ne!(task1.id, task2.id);
    }

    #[test]
    fn test_forward_transitions() {
        let mut task = Task::new("Lifecycle", TaskContext::new());
        task.advance(TaskStatus::Assigned).unwrap();
        task.advance(TaskStatus::Running).unwrap();
        task.advance(TaskStatus::Completed).unwrap();
        assert!(task.status.is_terminal());
    }

    #[test]
    fn test_rejected_transitions() {
        for from in TaskStatus::ALL {
            for to in TaskStatus::ALL {
                let allowed = from.can_transition_to(to);
                let expected = matches!(
                    (from, to),
                    (TaskStatus::Created, TaskStatus::Assigned)
                        | (TaskStatus::Assigned, TaskStatus::Running)
                        | (TaskStatus::Running, TaskStatus::Completed)
                        | (TaskStatus::Running, TaskStatus::Failed)
                );
                assert_eq!(allowed, expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_advance_reports_invalid_transition() {
        let mut task = Task::new("Skip ahead", TaskContext::new());
        let err = task.advance(TaskStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            crate::ModumindError::InvalidTransition {
                from: TaskStatus::Created,
                to: TaskStatus::Completed,
                ..
            }
        ));
        assert_eq!(task.status, TaskStatus::Created);
    }

    #[test]
    fn test_assign_sets_agent_and_status() {
        let mut task = Task::new("Assign me", TaskContext::new());
        task.assign("executor").unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_agent.as_deref(), Some("executor"));

        let err = task.assign("coder").unwrap_err();
        assert!(matches!(err, crate::ModumindError::InvalidState(_)));
        assert_eq!(task.assigned_agent.as_deref(), Some("executor"));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("running".parse::<TaskStatus>(), Ok(TaskStatus::Running));
        assert_eq!("COMPLETED".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert!("pending".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_serialization() {
        let task = Task::new("Serialization test", TaskContext::new());

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "created");
        assert!(json["assigned_agent"].is_null());

        let deserialized: Task = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, task);
    }
}
