//! The orchestrator facade: one owner for registry, store, router and
//! correlator.

use crate::config::OrchestratorConfig;
use crate::correlator::MessageCorrelator;
use crate::delegate::{Delegate, build_delegate};
use crate::events::OrchestratorEvent;
use crate::registry::AgentRegistry;
use crate::routing::Router;
use crate::status::{AgentActivity, AgentStatus, StatusSnapshot, count_by_status};
use crate::store::TaskStore;
use modumind_common::{
    AgentDescriptor, Message, ModumindError, Result, Task, TaskContext, TaskId, TaskStatus,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Coordinates worker agents: registers them, routes submitted tasks to
/// them and answers messages about those tasks.
///
/// All state is owned by the instance; every method takes `&self`, so an
/// `Arc<Orchestrator>` can be shared between concurrent callers.
pub struct Orchestrator {
    registry: AgentRegistry,
    store: TaskStore,
    router: Router,
    correlator: MessageCorrelator,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl Orchestrator {
    /// Create an orchestrator, building the delegate from the config and
    /// registering the configured agents.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        let delegate = build_delegate(&config.delegation)?;
        Ok(Self::with_delegate(config, delegate))
    }

    pub fn with_delegate(config: OrchestratorConfig, delegate: Arc<dyn Delegate>) -> Self {
        info!(
            delegate = %delegate.name(),
            rules = config.routing.rules.len(),
            max_tasks = config.retention.max_tasks,
            "Initializing orchestrator"
        );

        let (events, _) = broadcast::channel(config.events.capacity.max(1));
        let orchestrator = Self {
            registry: AgentRegistry::new(),
            store: TaskStore::with_retention(&config.retention),
            router: Router::new(config.routing),
            correlator: MessageCorrelator::new(delegate, config.delegation.timeout()),
            events,
        };

        for agent in config.agents {
            orchestrator.register_agent(agent);
        }
        orchestrator
    }

    /// Receive lifecycle events, including assignment notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn delegate_name(&self) -> &str {
        self.correlator.delegate_name()
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Register an agent, replacing any agent with the same name.
    pub fn register_agent(&self, descriptor: AgentDescriptor) -> Option<AgentDescriptor> {
        let name = descriptor.name.clone();
        let role = descriptor.role;
        let previous = self.registry.register(descriptor);

        self.emit(OrchestratorEvent::AgentRegistered {
            name,
            role,
            replaced: previous.is_some(),
        });
        previous
    }

    /// Remove an agent. Refused while the agent holds assigned or running
    /// tasks.
    pub fn deregister_agent(&self, name: &str) -> Result<AgentDescriptor> {
        let mut active = 0;
        let outcome = self.registry.deregister_if(name, |_| {
            active = self.store.active_for_agent(name);
            active == 0
        });

        match outcome {
            Ok(Some(agent)) => {
                self.emit(OrchestratorEvent::AgentDeregistered {
                    name: name.to_string(),
                });
                Ok(agent)
            }
            Ok(None) => Err(ModumindError::agent_not_found(name)),
            Err(_) => Err(ModumindError::InvalidState(format!(
                "agent {name} still holds {active} active tasks"
            ))),
        }
    }

    pub fn lookup_agent(&self, name: &str) -> Option<AgentDescriptor> {
        self.registry.lookup(name)
    }

    /// Registered agents in registration order.
    pub fn list_agents(&self) -> Vec<AgentDescriptor> {
        self.registry.all()
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Create a task and try to route it.
    ///
    /// The returned task is `Assigned` when an agent was found and stays
    /// `Created` with no agent otherwise.
    pub fn submit_task(&self, description: impl Into<String>, context: TaskContext) -> Task {
        let task = self.store.create(description, context);
        info!(
            task_id = %task.id,
            description = %task.description.chars().take(50).collect::<String>(),
            "Created task"
        );
        self.emit(OrchestratorEvent::TaskCreated {
            task_id: task.id.clone(),
        });

        let snapshot = self.registry.all();
        let decision = self.router.decide(&task.description, &snapshot);
        debug!(task_id = %task.id, reason = ?decision.reason, "Routing decision");

        let Some(agent) = decision.agent else {
            return self.routing_failed(task);
        };

        match self.assign_task(&task.id, &agent.name) {
            Ok(assigned) => assigned,
            // the agent left between snapshot and assignment
            Err(ModumindError::NotFound { .. }) => self.routing_failed(task),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Assignment failed");
                self.store.get(&task.id).unwrap_or(task)
            }
        }
    }

    /// Assign a `Created` task to a registered agent and notify it.
    pub fn assign_task(&self, id: &TaskId, agent_name: &str) -> Result<Task> {
        let task = self
            .registry
            .with_agent(agent_name, |_| self.store.set_assigned_agent(id, agent_name))
            .ok_or_else(|| ModumindError::agent_not_found(agent_name))??;

        info!(task_id = %task.id, agent = %agent_name, "Assigned task");
        self.emit(OrchestratorEvent::TaskAssigned {
            task_id: task.id.clone(),
            agent: agent_name.to_string(),
        });
        Ok(task)
    }

    pub fn transition_task(&self, id: &TaskId, status: TaskStatus) -> Result<Task> {
        let task = self.store.transition(id, status)?;
        info!(task_id = %id, status = %status, "Task status changed");
        self.emit(OrchestratorEvent::TaskStatusChanged {
            task_id: id.clone(),
            status,
        });
        Ok(task)
    }

    /// The assigned agent began working on the task.
    pub fn start_task(&self, id: &TaskId) -> Result<Task> {
        self.transition_task(id, TaskStatus::Running)
    }

    pub fn complete_task(&self, id: &TaskId) -> Result<Task> {
        self.transition_task(id, TaskStatus::Completed)
    }

    /// Fail a running task. A delegation still in flight for it has its
    /// result discarded.
    pub fn cancel_task(&self, id: &TaskId) -> Result<Task> {
        self.transition_task(id, TaskStatus::Failed)
    }

    pub fn get_task(&self, id: &TaskId) -> Result<Task> {
        self.store
            .get(id)
            .ok_or_else(|| ModumindError::task_not_found(id.as_str()))
    }

    /// Retained tasks in creation order, optionally filtered by status.
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Vec<Task> {
        self.store.list(status)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Answer an inbound message, correlating it with its task if any.
    pub async fn handle_message(&self, message: Message) -> Result<Message> {
        debug!(
            task_id = ?message.task_id(),
            content_preview = %message.content.chars().take(50).collect::<String>(),
            "Handling message"
        );
        self.correlator.handle(&message, &self.store).await
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Agent and task overview for dashboards.
    pub fn status(&self) -> StatusSnapshot {
        let agents = self.registry.all();
        let tasks = self.store.list(None);

        let agents = agents
            .into_iter()
            .map(|agent| {
                let active_tasks = tasks
                    .iter()
                    .filter(|t| {
                        t.status.is_active() && t.assigned_agent.as_deref() == Some(&agent.name)
                    })
                    .count();
                AgentStatus {
                    activity: if active_tasks > 0 {
                        AgentActivity::Busy
                    } else {
                        AgentActivity::Idle
                    },
                    active_tasks,
                    capabilities: agent.capabilities.into_iter().collect(),
                    role: agent.role,
                    name: agent.name,
                }
            })
            .collect();

        StatusSnapshot {
            agents,
            tasks: count_by_status(&tasks),
            total_tasks: tasks.len(),
            unassigned_tasks: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Created)
                .count(),
        }
    }

    fn routing_failed(&self, task: Task) -> Task {
        warn!(
            task_id = %task.id,
            description = %task.description,
            "No suitable agent found for task"
        );
        self.emit(OrchestratorEvent::RoutingFailed {
            task_id: task.id.clone(),
        });
        task
    }

    fn emit(&self, event: OrchestratorEvent) {
        // no subscribers is not an error
        let _ = self.events.send(event);
    }
}
