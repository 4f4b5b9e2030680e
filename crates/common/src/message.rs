//! Message types exchanged with the orchestrator.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key carrying the task reference of a message.
pub const TASK_ID_KEY: &str = "task_id";

/// An inbound message or a reply produced by the orchestrator.
///
/// Messages are transient: they never outlive a single handling call and
/// reference tasks only by identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message content
    pub content: String,

    /// Free-form metadata, including the optional `task_id` reference
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Message {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Build a message that references `task_id`.
    pub fn for_task(content: impl Into<String>, task_id: &TaskId) -> Self {
        Self::new(content).with_metadata(TASK_ID_KEY, task_id.as_str())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The referenced task, if the metadata carries a string `task_id`.
    pub fn task_id(&self) -> Option<TaskId> {
        self.metadata
            .get(TASK_ID_KEY)
            .and_then(Value::as_str)
            .map(TaskId::from)
    }
}
