//! Common types shared across ModuMind crates.
//!
//! Agents, tasks and messages as the orchestrator and its API gateway see
//! them, plus the shared error type.

pub mod agent;
pub mod error;
pub mod message;
pub mod task;

pub use agent::{AgentDescriptor, AgentRole};
pub use error::{ModumindError, Result};
pub use message::{Message, TASK_ID_KEY};
pub use task::{Task, TaskContext, TaskId, TaskStatus};
