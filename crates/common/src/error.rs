//! Error types for ModuMind.

use crate::task::TaskStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModumindError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Delegation failed: {0}")]
    Delegation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModumindError {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.into(),
        }
    }

    pub fn agent_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Agent",
            id: name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModumindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_entity() {
        let err = ModumindError::task_not_found("task_123");
        assert_eq!(err.to_string(), "Task not found: task_123");

        let err = ModumindError::agent_not_found("researcher");
        assert_eq!(err.to_string(), "Agent not found: researcher");
    }

    #[test]
    fn invalid_transition_shows_both_states() {
        let err = ModumindError::InvalidTransition {
            task_id: "task_1".into(),
            from: TaskStatus::Completed,
            to: TaskStatus::Running,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for task task_1: completed -> running"
        );
    }
}
