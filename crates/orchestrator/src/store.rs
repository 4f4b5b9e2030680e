//! In-memory task store.

use crate::config::RetentionConfig;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use modumind_common::{ModumindError, Result, Task, TaskContext, TaskId, TaskStatus};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Every task created by one orchestrator, indexed by id.
///
/// Operations on a single task are serialized by the map's per-entry lock;
/// operations on different tasks run in parallel. `order` keeps creation
/// order for listings and for retention.
pub struct TaskStore {
    tasks: DashMap<TaskId, Task>,
    order: Mutex<VecDeque<TaskId>>,
    evicted: Mutex<EvictedTasks>,
    max_tasks: usize,
}

/// Final status of tasks dropped by retention, forgotten oldest first.
struct EvictedTasks {
    statuses: HashMap<TaskId, TaskStatus>,
    order: VecDeque<TaskId>,
    capacity: usize,
}

impl EvictedTasks {
    fn new(capacity: usize) -> Self {
        Self {
            statuses: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn remember(&mut self, id: TaskId, status: TaskStatus) {
        if self.capacity == 0 {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.statuses.remove(&oldest);
            }
        }
        self.statuses.insert(id.clone(), status);
        self.order.push_back(id);
    }
}

impl TaskStore {
    pub fn new(max_tasks: usize) -> Self {
        Self::with_retention(&RetentionConfig {
            max_tasks,
            ..RetentionConfig::default()
        })
    }

    pub fn with_retention(config: &RetentionConfig) -> Self {
        Self {
            tasks: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            evicted: Mutex::new(EvictedTasks::new(config.remembered_evictions)),
            max_tasks: config.max_tasks.max(1),
        }
    }

    /// Create and store a task in `Created` status.
    pub fn create(&self, description: impl Into<String>, context: TaskContext) -> Task {
        let mut task = Task::new(description, context);
        let mut order = self.order.lock();

        loop {
            match self.tasks.entry(task.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(task.clone());
                    break;
                }
                // uuid v4 collision: draw again, ids are never reused
                Entry::Occupied(_) => task.id = TaskId::generate(),
            }
        }
        order.push_back(task.id.clone());
        debug!(task_id = %task.id, "Stored task");

        self.evict_terminal(&mut order);
        task
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.get(id).map(|entry| entry.value().clone())
    }

    /// Final status of a task that retention already dropped.
    pub fn evicted_status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.evicted.lock().statuses.get(id).copied()
    }

    /// Current status of a retained task, or the final status of an
    /// evicted one.
    pub fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.tasks
            .get(id)
            .map(|entry| entry.status)
            .or_else(|| self.evicted_status(id))
    }

    /// Move a task to `next`. Assignment must use [`Self::set_assigned_agent`].
    pub fn transition(&self, id: &TaskId, next: TaskStatus) -> Result<Task> {
        let mut entry = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| ModumindError::task_not_found(id.as_str()))?;

        if next == TaskStatus::Assigned && entry.status.can_transition_to(next) {
            return Err(ModumindError::InvalidState(format!(
                "task {id} can only become assigned through agent assignment"
            )));
        }
        entry.advance(next)?;
        Ok(entry.value().clone())
    }

    /// Record the handling agent and move `Created -> Assigned` atomically.
    pub fn set_assigned_agent(&self, id: &TaskId, agent_name: &str) -> Result<Task> {
        let mut entry = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| ModumindError::task_not_found(id.as_str()))?;
        entry.assign(agent_name)?;
        Ok(entry.value().clone())
    }

    /// Tasks in creation order, optionally restricted to one status.
    pub fn list(&self, status: Option<TaskStatus>) -> Vec<Task> {
        let order = self.order.lock();
        order
            .iter()
            .filter_map(|id| self.get(id))
            .filter(|task| status.map_or(true, |s| task.status == s))
            .collect()
    }

    /// Number of assigned or running tasks held by `agent_name`.
    pub fn active_for_agent(&self, agent_name: &str) -> usize {
        self.tasks
            .iter()
            .filter(|entry| {
                entry.status.is_active() && entry.assigned_agent.as_deref() == Some(agent_name)
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop the oldest terminal tasks until the store is within bounds.
    fn evict_terminal(&self, order: &mut VecDeque<TaskId>) {
        if order.len() <= self.max_tasks {
            return;
        }

        let mut excess = order.len() - self.max_tasks;
        order.retain(|id| {
            if excess == 0 {
                return true;
            }
            let removed = self
                .tasks
                .remove_if(id, |_, task| {
                    if !task.status.is_terminal() {
                        return false;
                    }
                    // recorded before the entry goes away; lookups check the map first
                    self.evicted.lock().remember(id.clone(), task.status);
                    true
                })
                .is_some();
            if removed {
                debug!(task_id = %id, "Evicted terminal task");
                excess -= 1;
            }
            !removed
        });

        if excess > 0 {
            warn!(
                retained = order.len(),
                max_tasks = self.max_tasks,
                "Task store over capacity, only active tasks remain"
            );
        }
    }
}
