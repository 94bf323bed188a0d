//! Handoff configuration file handling
//!
//! Loads and manages the ~/.config/agent-handoff/config.yaml file.

use crate::handoff::{Priority, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::routing::CapabilityRegistry;
use crate::{HandoffError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Snapshot store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file; the extension selects the backend
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("handoffs.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// One agent entry in the routing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,

    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Agents in registration order
    #[serde(default)]
    pub agents: Vec<AgentConfig>,

    /// Upper bound on a routing strategy call
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,
}

fn default_decision_timeout_ms() -> u64 {
    2000
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            decision_timeout_ms: default_decision_timeout_ms(),
        }
    }
}

/// Event delivery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast buffer for asynchronous subscribers
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Defaults applied to new requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    Priority::default().value()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
        }
    }
}

/// Agent handoff configuration
///
/// Represents the complete config.yaml file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl HandoffConfig {
    /// Create a configuration with every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path (~/.config/agent-handoff/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load `path` if given, otherwise the default file, falling back to
    /// defaults only when the default file does not exist
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load(&path)
                } else {
                    tracing::debug!(path = %path.display(), "No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(HandoffError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading handoff configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;

        tracing::debug!(
            agents = config.routing.agents.len(),
            store = %config.store.path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving handoff configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/agent-handoff/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("agent-handoff");
        path.push("config.yaml");
        path
    }

    /// Reject values the runtime cannot use
    pub fn validate(&self) -> Result<()> {
        if self.events.channel_capacity == 0 {
            return Err(HandoffError::Config(
                "events.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.routing.decision_timeout_ms == 0 {
            return Err(HandoffError::Config(
                "routing.decision_timeout_ms must be at least 1".to_string(),
            ));
        }
        Priority::new(self.defaults.priority)
            .map_err(|e| HandoffError::Config(format!("defaults.priority: {}", e)))?;

        let mut seen = HashSet::new();
        for agent in &self.routing.agents {
            if agent.id.trim().is_empty() {
                return Err(HandoffError::Config("routing agent with empty id".to_string()));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(HandoffError::Config(format!(
                    "duplicate routing agent: {}",
                    agent.id
                )));
            }
        }
        Ok(())
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    /// Append an agent to the routing table
    pub fn with_agent<I, S>(mut self, id: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routing.agents.push(AgentConfig {
            id: id.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.routing.decision_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.events.channel_capacity = capacity;
        self
    }

    pub fn with_default_priority(mut self, priority: u8) -> Self {
        self.defaults.priority = priority;
        self
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.routing.decision_timeout_ms)
    }

    /// Default request priority, falling back to 5 if the file value is invalid
    pub fn default_priority(&self) -> Priority {
        Priority::new(self.defaults.priority).unwrap_or_default()
    }

    /// Capability registry built from the routing table
    pub fn registry(&self) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        for agent in &self.routing.agents {
            registry.register(agent.id.clone(), agent.capabilities.iter().cloned());
        }
        registry
    }
}
