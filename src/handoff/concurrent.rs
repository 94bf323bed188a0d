//! Concurrent handoff manager
//!
//! Thread-safe lifecycle manager with per-record locking: the outer map lock is
//! held only long enough to find or insert a record, and each transition holds
//! only the mutex of the record it touches. Two racing `accept` calls on one
//! record therefore serialize (exactly one wins) while transitions on different
//! records proceed independently.

use super::events::{lock, read_lock, write_lock, EventEmitter, EventSink, HandoffEvent, HandoffEventKind};
use super::lifecycle::Transition;
use super::types::{HandoffRecord, HandoffRequest, HandoffStatus, Payload};
use crate::config::HandoffConfig;
use crate::metrics;
use crate::storage::HandoffSnapshot;
use crate::{HandoffError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

type RecordCell = Arc<Mutex<HandoffRecord>>;

/// Shared lifecycle manager that emits an event per committed transition
#[derive(Debug, Default)]
pub struct ConcurrentHandoffManager {
    records: RwLock<HashMap<String, RecordCell>>,
    events: EventEmitter,
}

impl ConcurrentHandoffManager {
    /// Create a manager with the default event channel capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager whose broadcast channel buffers `capacity` events
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            events: EventEmitter::new(capacity),
        }
    }

    /// Create a manager sized by the `events` section of `config`
    pub fn from_config(config: &HandoffConfig) -> Self {
        Self::with_event_capacity(config.events.channel_capacity)
    }

    pub fn event_capacity(&self) -> usize {
        self.events.capacity()
    }

    /// Register a synchronous observer
    pub fn add_listener(&self, listener: impl EventSink + 'static) {
        self.events.add_listener(listener);
    }

    /// Get a receiver for asynchronous observers
    pub fn subscribe(&self) -> broadcast::Receiver<HandoffEvent> {
        self.events.subscribe()
    }

    /// Create a new record in PENDING state
    pub fn create(&self, request: HandoffRequest) -> HandoffRecord {
        let record = HandoffRecord::new(request);
        write_lock(&self.records).insert(
            record.record_id.clone(),
            Arc::new(Mutex::new(record.clone())),
        );
        debug!(record_id = %record.record_id, "Handoff created");
        self.publish(HandoffEventKind::Created, &record);
        record
    }

    /// PENDING -> ACCEPTED
    pub fn accept(&self, record_id: &str) -> Result<HandoffRecord> {
        self.transition(record_id, Transition::Accept)
    }

    /// PENDING -> REJECTED
    pub fn reject(&self, record_id: &str, reason: impl Into<String>) -> Result<HandoffRecord> {
        self.transition(
            record_id,
            Transition::Reject {
                reason: reason.into(),
            },
        )
    }

    /// ACCEPTED -> IN_PROGRESS
    pub fn start(&self, record_id: &str) -> Result<HandoffRecord> {
        self.transition(record_id, Transition::Start)
    }

    /// ACCEPTED | IN_PROGRESS -> COMPLETED, storing `result`
    pub fn complete(&self, record_id: &str, result: Payload) -> Result<HandoffRecord> {
        self.transition(record_id, Transition::Complete { result })
    }

    /// ACCEPTED | IN_PROGRESS -> FAILED
    pub fn fail(&self, record_id: &str, reason: impl Into<String>) -> Result<HandoffRecord> {
        self.transition(
            record_id,
            Transition::Fail {
                reason: reason.into(),
            },
        )
    }

    /// Apply a transition under the record's own lock, then notify observers
    pub fn transition(&self, record_id: &str, transition: Transition) -> Result<HandoffRecord> {
        let cell = self.cell(record_id)?;
        let kind = HandoffEventKind::from(&transition);

        let record = {
            let mut guard = lock(&cell);
            transition.apply(&mut guard)?;
            guard.clone()
        };

        debug!(record_id, event = kind.name(), status = %record.status, "Handoff transitioned");
        self.publish(kind, &record);
        Ok(record)
    }

    /// Retrieve a copy of a record
    pub fn get(&self, record_id: &str) -> Result<HandoffRecord> {
        let cell = self.cell(record_id)?;
        let record = lock(&cell).clone();
        Ok(record)
    }

    /// Copies of all records, optionally filtered by status, oldest first
    pub fn list(&self, status: Option<HandoffStatus>) -> Vec<HandoffRecord> {
        let cells: Vec<RecordCell> = read_lock(&self.records).values().cloned().collect();
        let mut records: Vec<HandoffRecord> = cells
            .iter()
            .map(|cell| lock(cell).clone())
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        records
    }

    /// Snapshot every record, oldest first
    pub fn export(&self) -> Vec<HandoffSnapshot> {
        self.list(None).into_iter().map(HandoffSnapshot::new).collect()
    }

    /// Upsert snapshots (all-or-nothing)
    ///
    /// An existing record is overwritten in place under its own lock so
    /// concurrent holders of that record observe the replacement.
    pub fn import(&self, snapshots: Vec<HandoffSnapshot>) -> Result<usize> {
        for snapshot in &snapshots {
            snapshot.validate()?;
        }

        let count = snapshots.len();
        let mut records = write_lock(&self.records);
        for snapshot in snapshots {
            let record = snapshot.record;
            match records.get(&record.record_id) {
                Some(cell) => *lock(cell) = record,
                None => {
                    records.insert(record.record_id.clone(), Arc::new(Mutex::new(record)));
                }
            }
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        read_lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        read_lock(&self.records).is_empty()
    }

    fn cell(&self, record_id: &str) -> Result<RecordCell> {
        read_lock(&self.records)
            .get(record_id)
            .cloned()
            .ok_or_else(|| HandoffError::NotFound(record_id.to_string()))
    }

    fn publish(&self, kind: HandoffEventKind, record: &HandoffRecord) {
        metrics::record_transition(kind.label());
        self.events.emit(HandoffEvent::from_record(kind, record));
    }
}
