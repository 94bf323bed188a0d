//! Prometheus metrics for handoff activity
//!
//! Counters live in the default prometheus registry so any embedding service
//! can expose them next to its own metrics.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

lazy_static! {
    /// Counter: committed transitions by event
    pub static ref TRANSITIONS: CounterVec = register_counter_vec!(
        "handoff_transitions_total",
        "Committed handoff transitions by event",
        &["event"]
    )
    .expect("Failed to create transitions metric");

    /// Counter: event listener failures by event
    pub static ref OBSERVER_ERRORS: CounterVec = register_counter_vec!(
        "handoff_observer_errors_total",
        "Event listener failures by event",
        &["event"]
    )
    .expect("Failed to create observer_errors metric");

    /// Counter: routing decisions that fell back to the heuristic router
    pub static ref ROUTING_FALLBACKS: CounterVec = register_counter_vec!(
        "handoff_routing_fallbacks_total",
        "Routing decisions served by the heuristic fallback",
        &["cause"]
    )
    .expect("Failed to create routing_fallbacks metric");
}

/// Record a committed transition
pub fn record_transition(event: &str) {
    TRANSITIONS.with_label_values(&[event]).inc();
}

/// Record a failed event listener
pub fn record_observer_error(event: &str) {
    OBSERVER_ERRORS.with_label_values(&[event]).inc();
}

/// Record a heuristic routing fallback
pub fn record_routing_fallback(cause: &str) {
    ROUTING_FALLBACKS.with_label_values(&[cause]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
