//! Sequential handoff manager
//!
//! Single-owner lifecycle manager. All mutators take `&mut self`, so sharing
//! one across threads needs external synchronization; use
//! [`ConcurrentHandoffManager`](super::ConcurrentHandoffManager) for that.

use super::events::HandoffEventKind;
use super::lifecycle::Transition;
use super::store::RecordStore;
use super::types::{HandoffRecord, HandoffRequest, HandoffStatus, Payload};
use crate::storage::{self, HandoffRepository, HandoffSnapshot};
use crate::{metrics, HandoffError, Result};
use tracing::debug;

/// Creates handoff records and drives them through the state machine
#[derive(Debug, Default)]
pub struct HandoffManager {
    store: RecordStore,
}

impl HandoffManager {
    /// Create a manager with an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager over an existing store
    pub fn with_store(store: RecordStore) -> Self {
        Self { store }
    }

    /// Create a new record in PENDING state
    pub fn create(&mut self, request: HandoffRequest) -> HandoffRecord {
        let record = HandoffRecord::new(request);
        debug!(
            record_id = %record.record_id,
            from = %record.request.from_agent,
            to = %record.request.to_agent,
            "Handoff created"
        );
        self.store.upsert(record.clone());
        metrics::record_transition(HandoffEventKind::Created.label());
        record
    }

    /// PENDING -> ACCEPTED
    pub fn accept(&mut self, record_id: &str) -> Result<HandoffRecord> {
        self.transition(record_id, Transition::Accept)
    }

    /// PENDING -> REJECTED
    pub fn reject(&mut self, record_id: &str, reason: impl Into<String>) -> Result<HandoffRecord> {
        self.transition(
            record_id,
            Transition::Reject {
                reason: reason.into(),
            },
        )
    }

    /// ACCEPTED -> IN_PROGRESS
    pub fn start(&mut self, record_id: &str) -> Result<HandoffRecord> {
        self.transition(record_id, Transition::Start)
    }

    /// ACCEPTED | IN_PROGRESS -> COMPLETED, storing `result`
    pub fn complete(&mut self, record_id: &str, result: Payload) -> Result<HandoffRecord> {
        self.transition(record_id, Transition::Complete { result })
    }

    /// ACCEPTED | IN_PROGRESS -> FAILED
    pub fn fail(&mut self, record_id: &str, reason: impl Into<String>) -> Result<HandoffRecord> {
        self.transition(
            record_id,
            Transition::Fail {
                reason: reason.into(),
            },
        )
    }

    /// Apply any transition to a record
    pub fn transition(&mut self, record_id: &str, transition: Transition) -> Result<HandoffRecord> {
        let record = self
            .store
            .get_mut(record_id)
            .ok_or_else(|| HandoffError::NotFound(record_id.to_string()))?;

        let action = transition.action();
        let kind = HandoffEventKind::from(&transition);
        transition.apply(record)?;
        metrics::record_transition(kind.label());
        debug!(record_id, action, status = %record.status, "Handoff transitioned");

        Ok(record.clone())
    }

    /// Retrieve a record by id
    pub fn get(&self, record_id: &str) -> Result<&HandoffRecord> {
        self.store
            .get(record_id)
            .ok_or_else(|| HandoffError::NotFound(record_id.to_string()))
    }

    /// All records, optionally filtered by status, oldest first
    pub fn list(&self, status: Option<HandoffStatus>) -> Vec<&HandoffRecord> {
        self.store.list(status)
    }

    /// Read-only access to the underlying store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Snapshot every record
    pub fn export(&self) -> Vec<HandoffSnapshot> {
        storage::export(&self.store)
    }

    /// Upsert snapshots (all-or-nothing)
    pub fn import(&mut self, snapshots: Vec<HandoffSnapshot>) -> Result<usize> {
        storage::import(&mut self.store, snapshots)
    }

    /// Import every snapshot held by a persistence collaborator
    pub fn load_from(&mut self, repo: &dyn HandoffRepository) -> Result<usize> {
        let snapshots = repo.list(None)?;
        self.import(snapshots)
    }

    /// Upsert every record into a persistence collaborator
    pub fn save_to(&self, repo: &mut dyn HandoffRepository) -> Result<usize> {
        let snapshots = self.export();
        let count = snapshots.len();
        for snapshot in &snapshots {
            repo.upsert(snapshot.record_id(), snapshot)?;
        }
        repo.flush()?;
        Ok(count)
    }
}
