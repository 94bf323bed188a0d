//! Snapshot codec for export/import
//!
//! A snapshot is the canonical, transport-neutral form of a [`HandoffRecord`]:
//! every field including the nested request/response, timestamps as RFC 3339
//! strings, plus a format version. Export never mutates records; import is
//! all-or-nothing.

use crate::handoff::{HandoffRecord, RecordStore};
use crate::{HandoffError, Result};
use serde::{Deserialize, Serialize};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Versioned, lossless representation of one handoff record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffSnapshot {
    /// Format version (for backwards compatibility)
    #[serde(default = "default_version")]
    pub version: u32,

    /// The record data
    #[serde(flatten)]
    pub record: HandoffRecord,
}

impl HandoffSnapshot {
    /// Snapshot a record at the current version
    pub fn new(record: HandoffRecord) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            record,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record.record_id
    }

    /// Encode as a JSON value
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| HandoffError::Serialization(e.to_string()))
    }

    /// Decode and validate a JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let snapshot: Self = serde_json::from_value(value)
            .map_err(|e| HandoffError::Serialization(format!("Invalid snapshot: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Decode and validate one JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(text)
            .map_err(|e| HandoffError::Serialization(format!("Invalid snapshot: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check the record invariants a well-formed snapshot must satisfy
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            tracing::warn!(
                version = self.version,
                record_id = %self.record.record_id,
                "Unknown snapshot version, attempting to use it anyway"
            );
        }

        let record = &self.record;
        if record.record_id.trim().is_empty() {
            return Err(HandoffError::Serialization(
                "snapshot has an empty record_id".to_string(),
            ));
        }
        record.request.validate().map_err(|e| {
            HandoffError::Serialization(format!("record {}: {}", record.record_id, e))
        })?;
        if record.updated_at < record.created_at {
            return Err(HandoffError::Serialization(format!(
                "record {}: updated_at precedes created_at",
                record.record_id
            )));
        }
        Ok(())
    }
}

impl From<HandoffRecord> for HandoffSnapshot {
    fn from(record: HandoffRecord) -> Self {
        Self::new(record)
    }
}

/// Snapshot every record in the store, oldest first
pub fn export(store: &RecordStore) -> Vec<HandoffSnapshot> {
    store
        .list(None)
        .into_iter()
        .cloned()
        .map(HandoffSnapshot::new)
        .collect()
}

/// Upsert snapshots into the store
///
/// Every snapshot is validated before anything is written, so a malformed
/// entry leaves the store unchanged. Later entries with the same id win.
/// Returns the number of snapshots applied.
pub fn import(store: &mut RecordStore, snapshots: Vec<HandoffSnapshot>) -> Result<usize> {
    for snapshot in &snapshots {
        snapshot.validate()?;
    }

    let count = snapshots.len();
    for snapshot in snapshots {
        store.upsert(snapshot.record);
    }

    tracing::debug!(count, "Imported handoff snapshots");
    Ok(count)
}

/// Decode raw JSON values into snapshots, failing on the first bad entry
pub fn decode_all(values: Vec<serde_json::Value>) -> Result<Vec<HandoffSnapshot>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            HandoffSnapshot::from_value(value).map_err(|e| match e {
                HandoffError::Serialization(msg) => {
                    HandoffError::Serialization(format!("entry {}: {}", index, msg))
                }
                other => other,
            })
        })
        .collect()
}

/// Encode snapshots as raw JSON values
pub fn encode_all(snapshots: &[HandoffSnapshot]) -> Result<Vec<serde_json::Value>> {
    snapshots.iter().map(HandoffSnapshot::to_value).collect()
}
