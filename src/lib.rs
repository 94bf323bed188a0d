//! agent-handoff - Lifecycle management for work handed between agents
//!
//! One agent hands a task to another; the receiver accepts or rejects it and
//! drives accepted work to completion or failure. This crate provides the
//! state machine, a capability-based router and persistence for handoff
//! records.
//!
//! # Architecture
//!
//! - **handoff**: Data model, transition rules, sequential and concurrent managers, events
//! - **routing**: Capability registry, heuristic router, pluggable routing strategies
//! - **storage**: Snapshot export/import, JSON/JSONL files, SQLite
//! - **config**: YAML configuration
//! - **metrics**: Prometheus counters

// Core modules
pub mod config;
pub mod error;
pub mod handoff;
pub mod routing;
pub mod storage;

// Ambient
pub mod logging;
pub mod metrics;

// Re-exports
pub use error::{HandoffError, Result};
