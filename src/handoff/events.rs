//! Transition events
//!
//! Every committed transition on a [`ConcurrentHandoffManager`](super::ConcurrentHandoffManager)
//! produces one [`HandoffEvent`]. Events reach two kinds of observers:
//!
//! - synchronous listeners ([`EventSink`]), invoked in registration order on the
//!   thread that drove the transition, each isolated from the others;
//! - asynchronous subscribers holding a `tokio::sync::broadcast` receiver.
//!
//! A listener that errors or panics is logged and skipped. The transition has
//! already committed by the time any observer runs.

use super::lifecycle::Transition;
use super::types::{HandoffRecord, Payload};
use crate::metrics;
use serde::Serialize;
use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Default broadcast buffer for asynchronous subscribers
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Which lifecycle step an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffEventKind {
    Created,
    Accepted,
    Rejected,
    Started,
    Completed,
    Failed,
}

impl HandoffEventKind {
    /// Event name as published to observers
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "handoff.created",
            Self::Accepted => "handoff.accepted",
            Self::Rejected => "handoff.rejected",
            Self::Started => "handoff.started",
            Self::Completed => "handoff.completed",
            Self::Failed => "handoff.failed",
        }
    }

    /// Short label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl From<&Transition> for HandoffEventKind {
    fn from(transition: &Transition) -> Self {
        match transition {
            Transition::Accept => Self::Accepted,
            Transition::Reject { .. } => Self::Rejected,
            Transition::Start => Self::Started,
            Transition::Complete { .. } => Self::Completed,
            Transition::Fail { .. } => Self::Failed,
        }
    }
}

/// A named state-change notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffEvent {
    pub kind: HandoffEventKind,
    pub record_id: String,
    pub data: Payload,
}

impl HandoffEvent {
    /// Build the event for `kind` from the committed record
    pub fn from_record(kind: HandoffEventKind, record: &HandoffRecord) -> Self {
        let request = &record.request;
        let mut data = Payload::new();
        data.insert("record_id".into(), json!(record.record_id));
        data.insert("status".into(), json!(record.status.as_str()));
        data.insert("updated_at".into(), json!(record.updated_at.to_rfc3339()));

        match kind {
            HandoffEventKind::Created => {
                data.insert("from_agent".into(), json!(request.from_agent));
                data.insert("to_agent".into(), json!(request.to_agent));
                data.insert("task".into(), json!(request.task_description));
                data.insert("priority".into(), json!(request.priority.value()));
            }
            HandoffEventKind::Accepted => {
                data.insert("from_agent".into(), json!(request.from_agent));
                data.insert("to_agent".into(), json!(request.to_agent));
            }
            HandoffEventKind::Started => {
                data.insert("to_agent".into(), json!(request.to_agent));
            }
            HandoffEventKind::Completed => {
                data.insert("from_agent".into(), json!(request.from_agent));
                data.insert("to_agent".into(), json!(request.to_agent));
                data.insert("result".into(), json!(record.result));
            }
            HandoffEventKind::Rejected | HandoffEventKind::Failed => {
                let reason = record
                    .response
                    .as_ref()
                    .map(|r| r.reason.clone())
                    .unwrap_or_default();
                data.insert("reason".into(), json!(reason));
                data.insert("final_status".into(), json!(record.status.as_str()));
            }
        }

        Self {
            kind,
            record_id: record.record_id.clone(),
            data,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Event/notification collaborator
///
/// Implemented for any `Fn(&HandoffEvent) -> anyhow::Result<()>` closure.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &HandoffEvent) -> anyhow::Result<()>;
}

impl<F> EventSink for F
where
    F: Fn(&HandoffEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn emit(&self, event: &HandoffEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Observer list plus broadcast channel owned by a manager
pub struct EventEmitter {
    listeners: RwLock<Vec<Arc<dyn EventSink>>>,
    sender: broadcast::Sender<HandoffEvent>,
    capacity: usize,
}

impl EventEmitter {
    /// Create an emitter whose broadcast channel buffers `capacity` events
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            listeners: RwLock::new(Vec::new()),
            sender,
            capacity,
        }
    }

    /// Events a lagging subscriber can fall behind before losing some
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a synchronous listener
    pub fn add_listener(&self, listener: impl EventSink + 'static) {
        write_lock(&self.listeners).push(Arc::new(listener));
    }

    /// Number of registered synchronous listeners
    pub fn listener_count(&self) -> usize {
        read_lock(&self.listeners).len()
    }

    /// Get a receiver for asynchronous delivery
    pub fn subscribe(&self) -> broadcast::Receiver<HandoffEvent> {
        self.sender.subscribe()
    }

    /// Deliver an event to every observer
    ///
    /// Never fails: listener errors and panics are logged and counted.
    /// Returns the number of listeners that failed.
    pub fn emit(&self, event: HandoffEvent) -> usize {
        // Clone the list so listeners may register further listeners.
        let listeners: Vec<Arc<dyn EventSink>> = read_lock(&self.listeners).clone();
        let mut failures = 0;

        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.emit(&event)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            failures += 1;
            metrics::record_observer_error(event.name());
            tracing::warn!(
                event = event.name(),
                record_id = %event.record_id,
                error = %error,
                "Handoff event listener failed"
            );
        }

        // No subscribers is fine; the event is simply dropped.
        let _ = self.sender.send(event);
        failures
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.sender.receiver_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("listener panicked: {}", s)
    } else {
        "listener panicked".to_string()
    }
}

// Poisoning only means another thread panicked mid-operation; every write in
// this crate leaves the protected value consistent, so recover the guard.

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
