//! Application state for the API server.

use modumind_orchestrator::{Orchestrator, OrchestratorConfig};
use std::sync::Arc;

/// Shared application state for the API server.
pub struct AppState {
    /// The orchestrator behind every endpoint
    pub orchestrator: Arc<Orchestrator>,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state with the given orchestrator configuration.
    pub fn new(config: OrchestratorConfig) -> modumind_common::Result<Self> {
        let orchestrator = Orchestrator::new(config)?;
        Ok(Self::with_orchestrator(Arc::new(orchestrator)))
    }

    /// Serve an orchestrator the caller keeps a handle to.
    pub fn with_orchestrator(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
