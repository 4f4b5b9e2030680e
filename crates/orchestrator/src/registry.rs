//! Registry of known worker agents.

use modumind_common::AgentDescriptor;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Default)]
struct Inner {
    agents: HashMap<String, AgentDescriptor>,
    /// Names in registration order
    order: Vec<String>,
}

/// Holds every registered agent, keyed by name.
///
/// Reads and writes go through one `RwLock`, so `all()` is a consistent
/// snapshot: a selection made from it never sees a half-applied
/// registration.
#[derive(Default)]
pub struct AgentRegistry {
    inner: RwLock<Inner>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the agent keyed by `descriptor.name`.
    ///
    /// A replaced agent keeps its original position in registration order.
    /// Returns the descriptor that was replaced, if any.
    pub fn register(&self, descriptor: AgentDescriptor) -> Option<AgentDescriptor> {
        let mut inner = self.inner.write();
        let name = descriptor.name.clone();
        let role = descriptor.role;

        let previous = inner.agents.insert(name.clone(), descriptor);
        match &previous {
            Some(old) => {
                warn!(
                    agent = %name,
                    role = ?role,
                    previous_role = ?old.role,
                    "Replaced registered agent"
                );
            }
            None => {
                inner.order.push(name.clone());
                info!(agent = %name, role = ?role, "Registered agent");
            }
        }
        previous
    }

    pub fn lookup(&self, name: &str) -> Option<AgentDescriptor> {
        self.inner.read().agents.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().agents.contains_key(name)
    }

    /// All agents in registration order.
    pub fn all(&self) -> Vec<AgentDescriptor> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.agents.get(name).cloned())
            .collect()
    }

    /// Run `f` against the named agent while holding the read lock, so the
    /// agent cannot be deregistered until `f` returns.
    pub fn with_agent<R>(&self, name: &str, f: impl FnOnce(&AgentDescriptor) -> R) -> Option<R> {
        let inner = self.inner.read();
        inner.agents.get(name).map(f)
    }

    pub fn deregister(&self, name: &str) -> Option<AgentDescriptor> {
        self.deregister_if(name, |_| true).ok().flatten()
    }

    /// Remove the named agent if `allow` approves it.
    ///
    /// `allow` runs under the write lock. Returns `Ok(None)` for an unknown
    /// name and `Err(descriptor)` when `allow` refused the removal.
    pub fn deregister_if(
        &self,
        name: &str,
        allow: impl FnOnce(&AgentDescriptor) -> bool,
    ) -> Result<Option<AgentDescriptor>, AgentDescriptor> {
        let mut inner = self.inner.write();
        let Some(agent) = inner.agents.get(name) else {
            return Ok(None);
        };
        if !allow(agent) {
            return Err(agent.clone());
        }

        let removed = inner.agents.remove(name);
        inner.order.retain(|n| n != name);
        info!(agent = %name, "Deregistered agent");
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.inner.read().agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modumind_common::AgentRole;

    fn agent(name: &str, role: AgentRole, cap: &str) -> AgentDescriptor {
        AgentDescriptor::new(name, role).with_capability(cap)
    }

    #[test]
    fn register_and_lookup() {
        let registry = AgentRegistry::new();
        assert!(registry.is_empty());

        let previous = registry.register(agent("researcher", AgentRole::Researcher, "research"));
        assert!(previous.is_none());

        let found = registry.lookup("researcher").unwrap();
        assert_eq!(found.role, AgentRole::Researcher);
        assert!(registry.lookup("coder").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reregister_replaces_descriptor() {
        let registry = AgentRegistry::new();
        registry.register(agent("worker", AgentRole::Executor, "execution"));
        registry.register(agent("other", AgentRole::Coder, "coding"));

        let previous = registry.register(agent("worker", AgentRole::Researcher, "research"));
        assert_eq!(previous.unwrap().role, AgentRole::Executor);

        let current = registry.lookup("worker").unwrap();
        assert_eq!(current.role, AgentRole::Researcher);
        assert!(current.has_capability("research"));
        assert!(!current.has_capability("execution"));

        let names: Vec<_> = registry.all().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["worker", "other"]);
    }

    #[test]
    fn all_preserves_registration_order() {
        let registry = AgentRegistry::new();
        for name in ["c", "a", "b"] {
            registry.register(agent(name, AgentRole::Custom, "x"));
        }
        let names: Vec<_> = registry.all().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn deregister_removes_from_order() {
        let registry = AgentRegistry::new();
        registry.register(agent("a", AgentRole::Custom, "x"));
        registry.register(agent("b", AgentRole::Custom, "x"));

        assert!(registry.deregister("a").is_some());
        assert!(registry.deregister("a").is_none());
        let names: Vec<_> = registry.all().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn deregister_if_can_refuse() {
        let registry = AgentRegistry::new();
        registry.register(agent("busy", AgentRole::Executor, "execution"));

        let refused = registry.deregister_if("busy", |_| false);
        assert_eq!(refused.unwrap_err().name, "busy");
        assert!(registry.contains("busy"));

        assert!(matches!(registry.deregister_if("missing", |_| true), Ok(None)));
    }

    #[test]
    fn with_agent_sees_current_descriptor() {
        let registry = AgentRegistry::new();
        registry.register(agent("coder", AgentRole::Coder, "coding"));

        let role = registry.with_agent("coder", |a| a.role);
        assert_eq!(role, Some(AgentRole::Coder));
        assert_eq!(registry.with_agent("nobody", |a| a.role), None);
    }
}
