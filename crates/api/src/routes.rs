//! HTTP route handlers for the API.

use crate::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use modumind_common::{
    AgentDescriptor, Message, ModumindError, Task, TaskContext, TaskId, TaskStatus,
};
use modumind_orchestrator::StatusSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// Name of the capability answering messages
    pub delegate: String,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        delegate: state.orchestrator.delegate_name().to_string(),
    })
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ErrorResponse {
    fn bad_request(error: String, code: &'static str) -> Self {
        Self {
            error,
            code,
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ModumindError> for ErrorResponse {
    fn from(err: ModumindError) -> Self {
        let (status, code) = match &err {
            ModumindError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ModumindError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "INVALID_TRANSITION")
            }
            ModumindError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            ModumindError::Delegation(_) => (StatusCode::BAD_GATEWAY, "DELEGATION_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        if status.is_server_error() {
            error!(error = %err, code, "Request failed");
        }
        Self {
            error: err.to_string(),
            code,
            status,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

// ============================================================================
// Agents
// ============================================================================

/// Agent registration response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAgentResponse {
    pub agent: AgentDescriptor,
    /// Whether an agent with the same name was replaced
    pub replaced: bool,
}

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentDescriptor>> {
    Json(state.orchestrator.list_agents())
}

/// Register an agent, replacing any agent with the same name.
pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(descriptor): Json<AgentDescriptor>,
) -> Result<(StatusCode, Json<RegisterAgentResponse>), ErrorResponse> {
    if descriptor.name.trim().is_empty() {
        return Err(ErrorResponse::bad_request(
            "agent name must not be empty".into(),
            "INVALID_AGENT",
        ));
    }

    let replaced = state.orchestrator.register_agent(descriptor.clone()).is_some();
    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(RegisterAgentResponse {
            agent: descriptor,
            replaced,
        }),
    ))
}

pub async fn deregister_agent(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<AgentDescriptor>, ErrorResponse> {
    info!(agent = %name, "Deregistering agent");
    Ok(Json(state.orchestrator.deregister_agent(&name)?))
}

// ============================================================================
// Tasks
// ============================================================================

/// Task submission request body.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub description: String,
    #[serde(default)]
    pub context: TaskContext,
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<String>,
}

/// Manual assignment of a task routing left unassigned.
#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    pub agent: String,
}

/// Agent-side status report.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: TaskStatus,
}

/// Submit a task; it comes back assigned when an agent was found.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTaskRequest>,
) -> (StatusCode, Json<Task>) {
    let task = state
        .orchestrator
        .submit_task(request.description, request.context);
    (StatusCode::CREATED, Json(task))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<Task>>, ErrorResponse> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()
        .map_err(|e| ErrorResponse::bad_request(e, "INVALID_STATUS"))?;

    Ok(Json(state.orchestrator.list_tasks(status)))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ErrorResponse> {
    Ok(Json(state.orchestrator.get_task(&TaskId::from(id))?))
}

/// Hand a `created` task to a registered agent.
pub async fn assign_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<AssignTaskRequest>,
) -> Result<Json<Task>, ErrorResponse> {
    let id = TaskId::from(id);
    info!(task_id = %id, agent = %request.agent, "Manual assignment");
    Ok(Json(state.orchestrator.assign_task(&id, &request.agent)?))
}

pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Task>, ErrorResponse> {
    let id = TaskId::from(id);
    debug!(task_id = %id, status = %request.status, "Status report");
    Ok(Json(state.orchestrator.transition_task(&id, request.status)?))
}

// ============================================================================
// Messages and status
// ============================================================================

/// Send a message to the orchestrator and return its reply.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<Message>,
) -> Result<Json<Message>, ErrorResponse> {
    info!(
        content_preview = %message.content.chars().take(50).collect::<String>(),
        "Received message"
    );
    Ok(Json(state.orchestrator.handle_message(message).await?))
}

/// Dashboard overview of agents and task counts.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.orchestrator.status())
}
