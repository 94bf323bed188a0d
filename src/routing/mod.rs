//! Capability-based routing
//!
//! Agents advertise capability tags in a [`CapabilityRegistry`]. The
//! heuristic [`Router`] matches request keywords against them; the
//! [`SmartRouter`] consults an optional [`RoutingStrategy`] first.

mod registry;
mod router;
mod strategy;

pub use registry::{AgentCapabilities, CapabilityRegistry};
pub use router::{extract_keywords, Router};
pub use strategy::{
    HeuristicStrategy, RoutingDecision, RoutingStrategy, SmartRouter, DEFAULT_DECISION_TIMEOUT,
    HEURISTIC_CONFIDENCE,
};
