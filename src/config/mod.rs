//! Configuration system
//!
//! Loads ~/.config/agent-handoff/config.yaml with:
//! - Snapshot store location
//! - Routing agents and their capabilities
//! - Event channel sizing and request defaults

mod handoff_config;

pub use handoff_config::{
    AgentConfig, DefaultsConfig, EventsConfig, HandoffConfig, RoutingConfig, StoreConfig,
};
