//! The delegation capability: whatever produces replies to inbound messages.

use async_trait::async_trait;
use modumind_common::{Result, TaskContext};
use modumind_llm::{LlmClient, LlmConfig, LlmRequest, Sampling};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DelegationConfig;

const DELEGATE_SYSTEM_PROMPT: &str = r#"You are the orchestrator of a team of specialized agents.
Answer the incoming message on behalf of the team.
When task context is provided, ground your answer in it and stay focused on that task.
"#;

/// Result of one delegation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delegation {
    /// Reply text
    pub content: String,

    /// Structured directives merged into the reply metadata
    pub metadata: Map<String, Value>,
}

impl Delegation {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }
}

/// An external capability that answers a prompt given task context.
///
/// Calls may be slow; the orchestrator never holds a lock across them.
#[async_trait]
pub trait Delegate: Send + Sync {
    async fn invoke(&self, prompt: &str, context: &TaskContext) -> Result<Delegation>;

    fn name(&self) -> &str;
}

/// Acknowledges the message without consulting a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoDelegate;

#[async_trait]
impl Delegate for EchoDelegate {
    async fn invoke(&self, prompt: &str, _context: &TaskContext) -> Result<Delegation> {
        Ok(Delegation::text(format!("Received message: {prompt}")))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Delegates to a language model.
pub struct LlmDelegate {
    client: Arc<dyn LlmClient>,
    sampling: Sampling,
}

impl LlmDelegate {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            sampling: Sampling::default(),
        }
    }

    /// Build the model client for `config`. A call that cannot get a request
    /// slot within `queue_timeout` fails instead of queueing further.
    pub fn from_config(config: &LlmConfig, queue_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: modumind_llm::build_llm_client(config, queue_timeout)?,
            sampling: config.sampling(),
        })
    }

    fn build_request(&self, prompt: &str, context: &TaskContext) -> Result<LlmRequest> {
        let mut instructions = DELEGATE_SYSTEM_PROMPT.to_string();
        if !context.is_empty() {
            instructions.push_str("\nTask context (JSON):\n");
            instructions.push_str(&serde_json::to_string_pretty(context)?);
        }

        Ok(LlmRequest::prompt(Some(instructions), prompt).with_sampling(self.sampling))
    }
}

#[async_trait]
impl Delegate for LlmDelegate {
    async fn invoke(&self, prompt: &str, context: &TaskContext) -> Result<Delegation> {
        let request = self.build_request(prompt, context)?;
        let response = self.client.complete(request).await?;

        debug!(
            model = %response.model,
            finish_reason = ?response.finish_reason,
            "Delegation completed"
        );

        let mut metadata = Map::new();
        if let Some(usage) = response.usage {
            metadata.insert("total_tokens".into(), Value::from(usage.total()));
        }
        if response.truncated() {
            warn!(model = %response.model, "Reply cut off at the token limit");
            metadata.insert("truncated".into(), Value::Bool(true));
        }
        metadata.insert("model".into(), Value::String(response.model));
        Ok(Delegation {
            content: response.content,
            metadata,
        })
    }

    fn name(&self) -> &str {
        self.client.model_name()
    }
}

/// Build the delegate described by `config`, echoing when no model is set.
pub fn build_delegate(config: &DelegationConfig) -> Result<Arc<dyn Delegate>> {
    match &config.llm {
        Some(llm) => Ok(Arc::new(LlmDelegate::from_config(
            llm,
            config.queue_timeout(),
        )?)),
        None => Ok(Arc::new(EchoDelegate)),
    }
}
