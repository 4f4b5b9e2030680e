//! Agent orchestrator for ModuMind.
//!
//! The orchestrator is the central coordinator that:
//! 1. Keeps a registry of named worker agents and their capabilities
//! 2. Routes submitted tasks to capable agents by description keywords
//! 3. Tracks every task through its lifecycle
//! 4. Answers inbound messages, correlated with the task they reference
//!
//! # Architecture
//!
//! ```text
//!   submit_task / handle_message
//!              │
//!              ▼
//!     ┌─────────────────┐
//!     │  Orchestrator   │ ──► events (broadcast)
//!     └────────┬────────┘
//!     ┌────────┼──────────────┬──────────────┐
//!     ▼        ▼              ▼              ▼
//! [Registry] [Router]    [TaskStore]   [Correlator] ──► Delegate
//!                                                       (echo / LLM)
//! ```

pub mod config;
pub mod correlator;
pub mod delegate;
pub mod events;
pub mod orchestrator;
pub mod registry;
pub mod routing;
pub mod status;
pub mod store;

pub use config::{
    DelegationConfig, EventConfig, OrchestratorConfig, RetentionConfig, RoutingConfig,
};
pub use correlator::MessageCorrelator;
pub use delegate::{Delegate, Delegation, EchoDelegate, LlmDelegate, build_delegate};
pub use events::OrchestratorEvent;
pub use orchestrator::Orchestrator;
pub use registry::AgentRegistry;
pub use routing::{RouteDecision, RouteReason, Router, RoutingRule};
pub use status::{AgentActivity, AgentStatus, StatusSnapshot};
pub use store::TaskStore;
