//! Task routing: map a task description to the agent that should handle it.
//!
//! Routing is driven by an ordered rule table of `(capability, triggers)`.
//! The description is split into lowercase tokens; the first rule whose
//! triggers intersect those tokens names the capability to look for. When no
//! rule matches, the configured default capability is used instead.
//!
//! ```text
//! "Research the latest developments"
//!        │ tokenize
//!        ▼
//! {research, the, latest, developments}
//!        │ first matching rule
//!        ▼
//! research ──► first agent advertising "research"
//!              (or an agent literally named "research")
//! ```

use crate::config::RoutingConfig;
use modumind_common::{AgentDescriptor, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One entry of the routing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Capability tag an agent must advertise
    pub capability: String,

    /// Tokens that trigger this rule (matched case-insensitively)
    pub triggers: Vec<String>,
}

impl RoutingRule {
    pub fn new<I, S>(capability: impl Into<String>, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capability: capability.into(),
            triggers: triggers.into_iter().map(Into::into).collect(),
        }
    }

    /// research, then execution, then coding.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("research", ["research", "browse", "search"]),
            Self::new("execution", ["execute", "run", "implement"]),
            Self::new("coding", ["code", "program", "develop"]),
        ]
    }

    fn matches(&self, tokens: &HashSet<String>) -> bool {
        self.triggers
            .iter()
            .any(|trigger| tokens.contains(&trigger.to_lowercase()))
    }
}

/// Why a route was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteReason {
    /// A rule's trigger appeared in the description
    Rule { capability: String },
    /// No rule matched; the default capability was used
    Fallback { capability: String },
    /// No rule matched and no fallback is configured
    NoMatch,
}

/// The outcome of routing one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub agent: Option<AgentDescriptor>,
    pub reason: RouteReason,
}

impl RouteDecision {
    pub fn capability(&self) -> Option<&str> {
        match &self.reason {
            RouteReason::Rule { capability } | RouteReason::Fallback { capability } => {
                Some(capability)
            }
            RouteReason::NoMatch => None,
        }
    }
}

/// Selection policy over a registry snapshot. Performs no I/O.
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<RoutingRule>,
    default_capability: Option<String>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

impl Router {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            rules: config.rules,
            default_capability: config.default_capability.filter(|c| !c.is_empty()),
        }
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Pick the agent for `task` from `agents` (registration order).
    pub fn select(&self, task: &Task, agents: &[AgentDescriptor]) -> Option<AgentDescriptor> {
        self.decide(&task.description, agents).agent
    }

    /// Route a description, reporting which rule (if any) decided it.
    ///
    /// A matched rule whose capability no agent provides yields no agent;
    /// the default capability only applies when no rule matched at all.
    pub fn decide(&self, description: &str, agents: &[AgentDescriptor]) -> RouteDecision {
        let tokens = tokenize(description);

        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(&tokens)) {
            return RouteDecision {
                agent: find_capable(agents, &rule.capability),
                reason: RouteReason::Rule {
                    capability: rule.capability.clone(),
                },
            };
        }

        match &self.default_capability {
            Some(capability) => RouteDecision {
                agent: find_capable(agents, capability),
                reason: RouteReason::Fallback {
                    capability: capability.clone(),
                },
            },
            None => RouteDecision {
                agent: None,
                reason: RouteReason::NoMatch,
            },
        }
    }
}

/// Lowercase alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// First agent advertising `capability`, else one named after it.
fn find_capable(agents: &[AgentDescriptor], capability: &str) -> Option<AgentDescriptor> {
    agents
        .iter()
        .find(|agent| agent.has_capability(capability))
        .or_else(|| agents.iter().find(|agent| agent.name == capability))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use modumind_common::{AgentRole, TaskContext};

    fn roster() -> Vec<AgentDescriptor> {
        vec![
            AgentDescriptor::new("researcher", AgentRole::Researcher).with_capability("research"),
            AgentDescriptor::new("executor", AgentRole::Executor).with_capability("execution"),
            AgentDescriptor::new("coder", AgentRole::Coder).with_capability("coding"),
        ]
    }

    fn route(description: &str, agents: &[AgentDescriptor]) -> Option<String> {
        let task = Task::new(description, TaskContext::new());
        Router::default().select(&task, agents).map(|a| a.name)
    }

    #[test]
    fn tokenize_splits_on_punctuation() {
        let tokens = tokenize("Research: AI-orchestration, (v2)!");
        assert!(tokens.contains("research"));
        assert!(tokens.contains("ai"));
        assert!(tokens.contains("orchestration"));
        assert!(tokens.contains("v2"));
        assert!(!tokens.contains(""));
    }

    #[test]
    fn routes_by_first_matching_rule() {
        let agents = roster();
        let description = "Research the latest developments in AI orchestration frameworks";
        assert_eq!(route(description, &agents).as_deref(), Some("researcher"));
        assert_eq!(route("Please run the migration", &agents).as_deref(), Some("executor"));
        assert_eq!(route("Write code for the parser", &agents).as_deref(), Some("coder"));
    }

    #[test]
    fn earlier_rule_wins_over_later_rule() {
        let agents = roster();
        assert_eq!(
            route("Implement what the research found", &agents).as_deref(),
            Some("researcher")
        );
    }

    #[test]
    fn matching_is_token_based() {
        let agents = roster();
        // "researching" and "running" are not trigger tokens
        assert_eq!(
            route("Researching options while running late", &agents).as_deref(),
            Some("executor")
        );
        assert_eq!(route("CODE REVIEW", &agents).as_deref(), Some("coder"));
    }

    #[test]
    fn falls_back_to_execution() {
        let agents = roster();
        let decision = Router::default().decide("Summarize the meeting", &agents);
        assert_eq!(decision.agent.unwrap().name, "executor");
        assert_eq!(
            decision.reason,
            RouteReason::Fallback {
                capability: "execution".into()
            }
        );
    }

    #[test]
    fn matched_rule_without_agent_does_not_fall_back() {
        let agents = vec![
            AgentDescriptor::new("executor", AgentRole::Executor).with_capability("execution"),
        ];
        let decision = Router::default().decide("Search the archive", &agents);
        assert!(decision.agent.is_none());
        assert_eq!(decision.capability(), Some("research"));
    }

    #[test]
    fn falls_back_to_agent_named_after_capability() {
        let agents = vec![AgentDescriptor::new("research", AgentRole::Researcher)];
        assert_eq!(route("browse the docs", &agents).as_deref(), Some("research"));
    }

    #[test]
    fn capability_beats_name_match() {
        let agents = vec![
            AgentDescriptor::new("research", AgentRole::Custom),
            AgentDescriptor::new("scout", AgentRole::Researcher).with_capability("research"),
        ];
        assert_eq!(route("research this", &agents).as_deref(), Some("scout"));
    }

    #[test]
    fn empty_registry_selects_nothing() {
        assert!(route("do X", &[]).is_none());
    }

    #[test]
    fn disabled_fallback_reports_no_match() {
        let router = Router::new(RoutingConfig {
            rules: RoutingRule::defaults(),
            default_capability: Some(String::new()),
        });
        let decision = router.decide("do X", &roster());
        assert_eq!(decision.reason, RouteReason::NoMatch);
        assert!(decision.agent.is_none());
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let router = Router::new(RoutingConfig {
            rules: vec![RoutingRule::new("writing", ["Draft", "write"])],
            default_capability: None,
        });
        let agents =
            vec![AgentDescriptor::new("writer", AgentRole::Writer).with_capability("writing")];
        let task = Task::new("draft the release notes", TaskContext::new());
        assert_eq!(router.select(&task, &agents).unwrap().name, "writer");
    }

    #[test]
    fn selection_is_deterministic() {
        let agents = roster();
        let router = Router::default();
        let task = Task::new("search and implement", TaskContext::new());
        let first = router.select(&task, &agents);
        for _ in 0..10 {
            assert_eq!(router.select(&task, &agents), first);
        }
    }
}
