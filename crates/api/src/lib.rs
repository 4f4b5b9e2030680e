//! REST API gateway for ModuMind.
//!
//! This crate exposes the orchestrator over HTTP with JSON bodies.
//!
//! # Endpoints
//!
//! ## Core
//! - `GET /health` - Health check
//! - `POST /api/v1/messages` - Send a message, optionally about a task
//! - `GET /api/v1/status` - Agent activity and task counts
//!
//! ## Agents
//! - `GET /api/v1/agents` - List registered agents
//! - `POST /api/v1/agents` - Register (or replace) an agent
//! - `DELETE /api/v1/agents/{name}` - Deregister an idle agent
//!
//! ## Tasks
//! - `GET /api/v1/tasks?status=<status>` - List tasks in creation order
//! - `POST /api/v1/tasks` - Submit a task for routing
//! - `GET /api/v1/tasks/{id}` - Get one task
//! - `POST /api/v1/tasks/{id}/assign` - Assign an unrouted task to an agent
//! - `POST /api/v1/tasks/{id}/status` - Report a status change
//!
//! Errors are returned as `{"error": ..., "code": ...}`.

pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(routes::health))
        // API v1 - Core routes
        .route("/api/v1/messages", post(routes::send_message))
        .route("/api/v1/status", get(routes::status))
        // API v1 - Agents
        .route(
            "/api/v1/agents",
            get(routes::list_agents).post(routes::register_agent),
        )
        .route("/api/v1/agents/{name}", delete(routes::deregister_agent))
        // API v1 - Tasks
        .route(
            "/api/v1/tasks",
            get(routes::list_tasks).post(routes::create_task),
        )
        .route("/api/v1/tasks/{id}", get(routes::get_task))
        .route("/api/v1/tasks/{id}/assign", post(routes::assign_task))
        .route("/api/v1/tasks/{id}/status", post(routes::update_task_status))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address, stopping on Ctrl-C.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting ModuMind API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
