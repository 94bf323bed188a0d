//! In-memory record store
//!
//! Keyed collection of handoff records. Owns no business rules; the lifecycle
//! managers decide what gets written.

use super::types::{HandoffRecord, HandoffStatus};
use std::collections::HashMap;

/// Handoff records by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: HashMap<String, HandoffRecord>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the record with the same id
    ///
    /// Returns the previous record if one was replaced.
    pub fn upsert(&mut self, record: HandoffRecord) -> Option<HandoffRecord> {
        self.records.insert(record.record_id.clone(), record)
    }

    pub fn get(&self, record_id: &str) -> Option<&HandoffRecord> {
        self.records.get(record_id)
    }

    pub fn get_mut(&mut self, record_id: &str) -> Option<&mut HandoffRecord> {
        self.records.get_mut(record_id)
    }

    pub fn remove(&mut self, record_id: &str) -> Option<HandoffRecord> {
        self.records.remove(record_id)
    }

    pub fn contains(&self, record_id: &str) -> bool {
        self.records.contains_key(record_id)
    }

    /// Records matching `status` (all when `None`), oldest first
    ///
    /// Ties on `created_at` are broken by id so the order is deterministic.
    pub fn list(&self, status: Option<HandoffStatus>) -> Vec<&HandoffRecord> {
        let mut records: Vec<&HandoffRecord> = self
            .records
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        records
    }

    /// Iterate over every record in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &HandoffRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
