//! Model selection for delegation, and the request limiter placed in
//! front of the model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modumind_common::{ModumindError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::client::{LlmClient, LlmRequest, LlmResponse, Sampling};
use crate::openai::OpenAiClient;

/// Supported model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any server speaking the OpenAI chat-completions API, Ollama included
    #[serde(alias = "ollama")]
    OpenAi,
}

/// The `[delegation.llm]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Delegations allowed to wait on the model at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

fn default_max_concurrent() -> usize {
    2
}

impl LlmConfig {
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: None,
            api_url: None,
            temperature: None,
            max_tokens: None,
            max_concurrent_requests: default_max_concurrent(),
        }
    }

    pub fn sampling(&self) -> Sampling {
        Sampling {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// The configured key, else `OPENAI_API_KEY`. Empty values count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        let configured = self.api_key.clone().filter(|key| !key.is_empty());
        match self.provider {
            LlmProvider::OpenAi => configured.or_else(|| {
                std::env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|key| !key.is_empty())
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ModumindError::Config("delegation.llm.model is empty".into()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ModumindError::Config(
                "delegation.llm.max_concurrent_requests must be at least 1".into(),
            ));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ModumindError::Config(format!(
                    "delegation.llm.temperature {t} is outside 0.0..=2.0"
                )));
            }
        }
        Ok(())
    }
}

/// Bounds the delegations waiting on one model.
///
/// A caller that gets no slot within `queue_timeout` fails with a
/// `Delegation` error naming the saturation, rather than spending its whole
/// delegation budget in the queue.
pub struct ThrottledClient {
    inner: Arc<dyn LlmClient>,
    slots: Semaphore,
    capacity: usize,
    queue_timeout: Duration,
}

impl ThrottledClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_in_flight: usize, queue_timeout: Duration) -> Self {
        let capacity = max_in_flight.max(1);
        Self {
            inner,
            slots: Semaphore::new(capacity),
            capacity,
            queue_timeout,
        }
    }

    /// Requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }
}

#[async_trait]
impl LlmClient for ThrottledClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _slot = match tokio::time::timeout(self.queue_timeout, self.slots.acquire()).await {
            Ok(Ok(slot)) => slot,
            Ok(Err(_)) => {
                return Err(ModumindError::Delegation("request limiter closed".into()));
            }
            Err(_) => {
                warn!(
                    model = %self.inner.model_name(),
                    in_flight = self.capacity,
                    "No request slot became free"
                );
                return Err(ModumindError::Delegation(format!(
                    "{} requests to {} already in flight, none finished within {} ms",
                    self.capacity,
                    self.inner.model_name(),
                    self.queue_timeout.as_millis()
                )));
            }
        };

        debug!(in_flight = self.in_flight(), capacity = self.capacity, "Request slot acquired");
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build the client for `config`. Queued requests give up after
/// `queue_timeout`.
pub fn build_llm_client(
    config: &LlmConfig,
    queue_timeout: Duration,
) -> Result<Arc<dyn LlmClient>> {
    config.validate()?;

    let backend: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(
            config.api_url.clone(),
            config.model.clone(),
            config.resolve_api_key(),
        )),
    };

    Ok(Arc::new(ThrottledClient::new(
        backend,
        config.max_concurrent_requests,
        queue_timeout,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_is_an_openai_compatible_provider() {
        let config: LlmConfig = toml::from_str(
            r#"
provider = "ollama"
model = "llama3.2"
api_url = "http://localhost:11434"
temperature = 0.3
"#,
        )
        .unwrap();

        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(
            config.sampling(),
            Sampling {
                temperature: Some(0.3),
                max_tokens: None,
            }
        );
    }

    #[test]
    fn unknown_provider_does_not_parse() {
        let parsed = toml::from_str::<LlmConfig>("provider = \"gemini\"\nmodel = \"x\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn configured_key_wins_and_empty_key_is_unset() {
        let mut config = LlmConfig::new(LlmProvider::OpenAi, "llama3");
        config.api_key = Some("sk-config".into());
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-config"));

        config.api_key = Some(String::new());
        assert_ne!(config.resolve_api_key().as_deref(), Some(""));
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        let mut config = LlmConfig::new(LlmProvider::OpenAi, " ");
        assert!(matches!(config.validate(), Err(ModumindError::Config(_))));

        config.model = "llama3".into();
        config.max_concurrent_requests = 0;
        assert!(matches!(config.validate(), Err(ModumindError::Config(_))));

        config.max_concurrent_requests = 1;
        config.temperature = Some(3.5);
        assert!(matches!(config.validate(), Err(ModumindError::Config(_))));

        config.temperature = Some(0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn built_client_reports_model() {
        let config = LlmConfig::new(LlmProvider::OpenAi, "llama3");
        let client = build_llm_client(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(client.model_name(), "llama3");

        let invalid = LlmConfig::new(LlmProvider::OpenAi, "");
        assert!(build_llm_client(&invalid, Duration::from_secs(1)).is_err());
    }
}
