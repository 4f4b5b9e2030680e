//! Correlates inbound messages with the tasks they reference.

use crate::delegate::Delegate;
use crate::store::TaskStore;
use modumind_common::{Message, ModumindError, Result, TaskContext, TaskId, TaskStatus, TASK_ID_KEY};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Resolves messages against the task store and produces replies.
///
/// The correlator only reads tasks. Status changes are reported by the
/// agents doing the work.
pub struct MessageCorrelator {
    delegate: Arc<dyn Delegate>,
    timeout: Duration,
}

impl MessageCorrelator {
    pub fn new(delegate: Arc<dyn Delegate>, timeout: Duration) -> Self {
        Self { delegate, timeout }
    }

    pub fn delegate_name(&self) -> &str {
        self.delegate.name()
    }

    pub async fn handle(&self, message: &Message, store: &TaskStore) -> Result<Message> {
        let task_id = message.task_id();
        let task = task_id.as_ref().and_then(|id| store.get(id));

        if let Some(ref task) = task {
            if task.status == TaskStatus::Completed {
                debug!(task_id = %task.id, "Message for completed task, skipping delegation");
                return Ok(completed_reply(&task.id));
            }
        }

        if let (Some(id), None) = (&task_id, &task) {
            match store.evicted_status(id) {
                Some(TaskStatus::Completed) => {
                    debug!(task_id = %id, "Message for evicted completed task");
                    return Ok(completed_reply(id));
                }
                Some(status) => {
                    debug!(task_id = %id, %status, "Message references an evicted task");
                }
                None => debug!(task_id = %id, "Message references an unknown task"),
            }
        }

        let context = task
            .as_ref()
            .map(|t| t.context.clone())
            .unwrap_or_else(TaskContext::new);
        let started_active = task.as_ref().is_some_and(|t| !t.status.is_terminal());

        // no lock is held across the call
        let delegation = tokio::time::timeout(
            self.timeout,
            self.delegate.invoke(&message.content, &context),
        )
        .await
        .map_err(|_| {
            ModumindError::Delegation(format!(
                "{} did not answer within {} ms",
                self.delegate.name(),
                self.timeout.as_millis()
            ))
        })
        .and_then(|result| result)
        .inspect_err(|e| error!(task_id = ?task_id, error = %e, "Delegation failed"))?;

        if started_active {
            if let Some(id) = &task_id {
                if let Some(reply) = late_result_reply(store, id) {
                    return Ok(reply);
                }
            }
        }

        let echoed_id = message
            .metadata
            .get(TASK_ID_KEY)
            .cloned()
            .unwrap_or(Value::Null);

        let mut reply = Message::new(delegation.content);
        reply.metadata = delegation.metadata;
        reply.metadata.insert(TASK_ID_KEY.to_string(), echoed_id);
        Ok(reply)
    }
}

/// Reply for a task that became terminal while the delegate was working.
fn late_result_reply(store: &TaskStore, id: &TaskId) -> Option<Message> {
    let status = store.status_of(id)?;
    match status {
        TaskStatus::Completed => {
            info!(task_id = %id, "Task completed during delegation, discarding result");
            Some(completed_reply(id))
        }
        TaskStatus::Failed => {
            warn!(task_id = %id, "Task cancelled during delegation, discarding result");
            Some(
                Message::new(format!(
                    "Task {id} was cancelled before a response was produced."
                ))
                .with_metadata(TASK_ID_KEY, id.as_str())
                .with_metadata("discarded", true),
            )
        }
        _ => None,
    }
}

fn completed_reply(id: &TaskId) -> Message {
    Message::for_task(format!("Task {id} has already been completed."), id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::{Delegation, EchoDelegate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDelegate {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Delegate for CountingDelegate {
        async fn invoke(&self, prompt: &str, context: &TaskContext) -> Result<Delegation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Delegation::text(format!("{prompt} ({} context keys)", context.len())))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct SlowDelegate;

    #[async_trait]
    impl Delegate for SlowDelegate {
        async fn invoke(&self, _prompt: &str, _context: &TaskContext) -> Result<Delegation> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Delegation::text("too late"))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn counting() -> Arc<CountingDelegate> {
        Arc::new(CountingDelegate {
            calls: AtomicUsize::new(0),
        })
    }

    fn complete(store: &TaskStore, id: &TaskId) {
        store.set_assigned_agent(id, "executor").unwrap();
        store.transition(id, TaskStatus::Running).unwrap();
        store.transition(id, TaskStatus::Completed).unwrap();
    }

    #[tokio::test]
    async fn taskless_message_is_delegated() {
        let store = TaskStore::new(10);
        let correlator = MessageCorrelator::new(Arc::new(EchoDelegate), Duration::from_secs(1));

        let reply = correlator.handle(&Message::new("hello"), &store).await.unwrap();
        assert_eq!(reply.content, "Received message: hello");
        assert_eq!(reply.metadata[TASK_ID_KEY], Value::Null);
    }

    #[tokio::test]
    async fn completed_task_short_circuits() {
        let store = TaskStore::new(10);
        let task = store.create("done soon", TaskContext::new());
        complete(&store, &task.id);

        let delegate = counting();
        let correlator = MessageCorrelator::new(delegate.clone(), Duration::from_secs(1));
        let message = Message::for_task("ping", &task.id);

        let first = correlator.handle(&message, &store).await.unwrap();
        let second = correlator.handle(&message, &store).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.content,
            format!("Task {} has already been completed.", task.id)
        );
        assert_eq!(first.metadata[TASK_ID_KEY], task.id.as_str());
        assert_eq!(delegate.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get(&task.id).unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn evicted_completed_task_still_short_circuits() {
        let store = TaskStore::new(1);
        let task = store.create("done soon", TaskContext::new());
        complete(&store, &task.id);

        let delegate = counting();
        let correlator = MessageCorrelator::new(delegate.clone(), Duration::from_secs(1));
        let message = Message::for_task("ping", &task.id);
        let before = correlator.handle(&message, &store).await.unwrap();

        store.create("pushes the completed task out", TaskContext::new());
        assert!(store.get(&task.id).is_none());

        let after = correlator.handle(&message, &store).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(delegate.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn active_task_passes_context_to_delegate() {
        let store = TaskStore::new(10);
        let mut context = TaskContext::new();
        context.insert("priority".into(), "high".into());
        let task = store.create("in flight", context);

        let delegate = counting();
        let correlator = MessageCorrelator::new(delegate.clone(), Duration::from_secs(1));

        let reply = correlator
            .handle(&Message::for_task("status?", &task.id), &store)
            .await
            .unwrap();
        assert_eq!(reply.content, "status? (1 context keys)");
        assert_eq!(reply.metadata[TASK_ID_KEY], task.id.as_str());
        assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(&task.id).unwrap().status, TaskStatus::Created);
    }

    #[tokio::test]
    async fn unknown_task_id_is_echoed() {
        let store = TaskStore::new(10);
        let correlator = MessageCorrelator::new(Arc::new(EchoDelegate), Duration::from_secs(1));
        let message = Message::for_task("hi", &TaskId::from("task_unknown"));

        let reply = correlator.handle(&message, &store).await.unwrap();
        assert_eq!(reply.metadata[TASK_ID_KEY], "task_unknown");
    }

    #[tokio::test]
    async fn timeout_is_a_delegation_error() {
        let store = TaskStore::new(10);
        let task = store.create("slow", TaskContext::new());
        let correlator = MessageCorrelator::new(Arc::new(SlowDelegate), Duration::from_millis(100));

        let err = correlator
            .handle(&Message::for_task("ping", &task.id), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, ModumindError::Delegation(_)));
        assert_eq!(store.get(&task.id).unwrap().status, TaskStatus::Created);
    }
}
