//! Storage layer
//!
//! Snapshot export/import plus the persistence collaborators the managers
//! load from and save to: JSON/JSONL snapshot files and a SQLite database.

mod file;
mod jsonl;
mod snapshot;
mod sqlite;

pub use file::{FileFormat, SnapshotFile};
pub use jsonl::{read_snapshots, write_snapshots, JsonlReader, JsonlWriter};
pub use snapshot::{decode_all, encode_all, export, import, HandoffSnapshot, SNAPSHOT_VERSION};
pub use sqlite::{AgentRole, SqliteHandoffStore};

use crate::handoff::HandoffStatus;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Persistence collaborator keyed by record id
pub trait HandoffRepository {
    /// Snapshots ordered by creation time, optionally filtered by status
    fn list(&self, status: Option<HandoffStatus>) -> Result<Vec<HandoffSnapshot>>;

    fn get(&self, record_id: &str) -> Result<Option<HandoffSnapshot>>;

    /// Insert or fully replace the snapshot stored under `record_id`
    fn upsert(&mut self, record_id: &str, snapshot: &HandoffSnapshot) -> Result<()>;

    /// Returns whether a snapshot was removed
    fn delete(&mut self, record_id: &str) -> Result<bool>;

    /// Make pending writes durable
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Aggregate counts over every stored snapshot
    fn metrics(&self) -> Result<HandoffMetrics> {
        Ok(HandoffMetrics::from_snapshots(&self.list(None)?))
    }
}

/// Open the repository matching the file extension
///
/// `.db`/`.sqlite`/`.sqlite3` open a SQLite database, `.jsonl` a JSON Lines
/// file, anything else a JSON array file.
pub fn open_repository(path: impl AsRef<Path>) -> Result<Box<dyn HandoffRepository>> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("db" | "sqlite" | "sqlite3") => Ok(Box::new(SqliteHandoffStore::open(path)?)),
        _ => Ok(Box::new(SnapshotFile::open(path)?)),
    }
}

/// Aggregate statistics over stored handoffs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffMetrics {
    /// Number of records
    pub total: usize,

    /// Record count per status name
    pub by_status: BTreeMap<String, usize>,

    /// Mean seconds from creation to completion over completed records
    pub avg_duration_seconds: Option<f64>,

    /// Completed records as a fraction of terminal records
    pub completion_rate: Option<f64>,
}

impl HandoffMetrics {
    /// Build from per-status counts and a precomputed mean duration
    pub fn from_counts(by_status: BTreeMap<String, usize>, avg_duration_seconds: Option<f64>) -> Self {
        let total = by_status.values().sum();
        let count = |status: HandoffStatus| by_status.get(status.as_str()).copied().unwrap_or(0);

        let completed = count(HandoffStatus::Completed);
        let terminal = completed + count(HandoffStatus::Rejected) + count(HandoffStatus::Failed);
        let completion_rate = (terminal > 0).then(|| completed as f64 / terminal as f64);

        Self {
            total,
            by_status,
            avg_duration_seconds,
            completion_rate,
        }
    }

    pub fn from_snapshots(snapshots: &[HandoffSnapshot]) -> Self {
        let mut by_status = BTreeMap::new();
        let mut durations = Vec::new();

        for snapshot in snapshots {
            let record = &snapshot.record;
            *by_status.entry(record.status.as_str().to_string()).or_insert(0) += 1;
            if record.status == HandoffStatus::Completed {
                let seconds = record.duration().num_microseconds().map(|us| us as f64 / 1e6);
                if let Some(seconds) = seconds.filter(|s| *s >= 0.0) {
                    durations.push(seconds);
                }
            }
        }

        let avg = (!durations.is_empty()).then(|| durations.iter().sum::<f64>() / durations.len() as f64);
        Self::from_counts(by_status, avg)
    }
}
