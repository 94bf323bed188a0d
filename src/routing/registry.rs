//! Agent capability registry
//!
//! Maps agent ids to the capability tags they advertise. Registration order is
//! preserved and used as the tie-break when ranking matches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub agent_id: String,
    pub capabilities: BTreeSet<String>,
}

/// Tracks available agents and their capabilities for routing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityRegistry {
    agents: Vec<AgentCapabilities>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, replacing its whole capability set
    ///
    /// Duplicates collapse. Re-registering keeps the agent's original position.
    pub fn register<I, S>(&mut self, agent_id: impl Into<String>, capabilities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agent_id = agent_id.into();
        let capabilities: BTreeSet<String> = capabilities.into_iter().map(Into::into).collect();

        match self.agents.iter_mut().find(|a| a.agent_id == agent_id) {
            Some(existing) => existing.capabilities = capabilities,
            None => self.agents.push(AgentCapabilities {
                agent_id,
                capabilities,
            }),
        }
    }

    /// Remove an agent; silently ignored if absent
    pub fn unregister(&mut self, agent_id: &str) {
        self.agents.retain(|a| a.agent_id != agent_id);
    }

    /// Agents whose capabilities are a superset of `required`
    ///
    /// Ordered by descending overlap with `required`, ties in registration
    /// order. An empty requirement matches every agent.
    pub fn find_capable<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        let required: BTreeSet<&str> = required.iter().map(AsRef::as_ref).collect();

        let mut matches: Vec<(&str, usize)> = self
            .agents
            .iter()
            .filter(|a| required.iter().all(|cap| a.capabilities.contains(*cap)))
            .map(|a| {
                let overlap = a
                    .capabilities
                    .iter()
                    .filter(|cap| required.contains(cap.as_str()))
                    .count();
                (a.agent_id.as_str(), overlap)
            })
            .collect();

        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.into_iter().map(|(id, _)| id.to_string()).collect()
    }

    /// Capabilities of one agent
    pub fn capabilities(&self, agent_id: &str) -> Option<&BTreeSet<String>> {
        self.agents
            .iter()
            .find(|a| a.agent_id == agent_id)
            .map(|a| &a.capabilities)
    }

    /// Agent ids in registration order
    pub fn agent_ids(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.agent_id.as_str()).collect()
    }

    /// Registered agents in registration order
    pub fn agents(&self) -> &[AgentCapabilities] {
        &self.agents
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.iter().any(|a| a.agent_id == agent_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
