//! Configuration for the orchestrator.
//!
//! Every section has defaults, so an empty TOML file is a valid config.
//! On Unix, `from_file` refuses world-writable files and files that expose
//! an API key to every user on the machine.

use crate::routing::RoutingRule;
use modumind_common::AgentDescriptor;
use modumind_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Main orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub delegation: DelegationConfig,

    #[serde(default)]
    pub events: EventConfig,

    /// Agents registered at startup
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Ordered rule table; the first rule with a matching trigger wins
    #[serde(default = "RoutingRule::defaults")]
    pub rules: Vec<RoutingRule>,

    /// Capability used when no rule matches. An empty string disables the
    /// fallback.
    #[serde(default = "default_capability")]
    pub default_capability: Option<String>,
}

fn default_capability() -> Option<String> {
    Some("execution".into())
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            rules: RoutingRule::defaults(),
            default_capability: default_capability(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Upper bound on retained tasks; only terminal tasks are evicted
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,

    /// How many evicted task ids keep their final status, so messages about
    /// them are still answered. 0 forgets evicted tasks entirely.
    #[serde(default = "default_remembered_evictions")]
    pub remembered_evictions: usize,
}

fn default_max_tasks() -> usize {
    10_000
}

fn default_remembered_evictions() -> usize {
    100_000
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_tasks: default_max_tasks(),
            remembered_evictions: default_remembered_evictions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    /// Timeout for a single delegation call in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Language model used for replies. Without it replies echo the message.
    #[serde(default)]
    pub llm: Option<LlmConfig>,
}

fn default_timeout() -> u64 {
    30_000
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            llm: None,
        }
    }
}

impl DelegationConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    /// How long a delegation may wait for a free model request slot. Half
    /// the delegation budget, so a queued call still has time to run.
    pub fn queue_timeout(&self) -> std::time::Duration {
        self.timeout() / 2
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Capacity of the broadcast channel agents subscribe to
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file, validating its permissions first.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        let stores_key = config
            .delegation
            .llm
            .as_ref()
            .is_some_and(|llm| llm.api_key.is_some());
        if stores_key {
            warn!(
                "API key found in config file '{}'. \
                 Prefer the OPENAI_API_KEY environment variable.",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.retention.max_tasks == 0 {
            anyhow::bail!("retention.max_tasks must be at least 1");
        }
        if self.events.capacity == 0 {
            anyhow::bail!("events.capacity must be at least 1");
        }
        if let Some(rule) = self.routing.rules.iter().find(|r| r.triggers.is_empty()) {
            anyhow::bail!(
                "routing rule for capability '{}' has no triggers",
                rule.capability
            );
        }
        Ok(())
    }
}

/// Reject non-regular files, world-writable files, and world-readable files
/// that contain an API key.
#[cfg(unix)]
fn validate_config_file_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!("Config path '{}' is not a regular file.", path.display());
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)?;
    let has_api_key = content.contains("api_key");

    if has_api_key && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
