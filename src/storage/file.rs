//! File-backed snapshot repository
//!
//! Holds snapshots in memory and writes the whole file on flush, through a
//! temporary file in the same directory that is renamed over the target.

use super::jsonl::{JsonlReader, JsonlWriter};
use super::snapshot::{decode_all, encode_all, HandoffSnapshot};
use super::HandoffRepository;
use crate::handoff::HandoffStatus;
use crate::{HandoffError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// On-disk layout of a snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// One JSON array of snapshots
    JsonArray,
    /// One snapshot per line
    JsonLines,
}

impl FileFormat {
    /// Pick a format from the file extension (`.jsonl` means lines)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") => FileFormat::JsonLines,
            _ => FileFormat::JsonArray,
        }
    }
}

/// Snapshot repository persisted to a single JSON or JSONL file
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    format: FileFormat,
    snapshots: HashMap<String, HandoffSnapshot>,
    dirty: bool,
}

impl SnapshotFile {
    /// Open `path`, loading existing snapshots; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        let snapshots = if path.exists() {
            read_file(&path, format)?
        } else {
            Vec::new()
        };

        tracing::debug!(
            path = %path.display(),
            count = snapshots.len(),
            "Opened handoff snapshot file"
        );

        Ok(Self {
            path,
            format,
            snapshots: snapshots
                .into_iter()
                .map(|s| (s.record_id().to_string(), s))
                .collect(),
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    fn sorted(&self) -> Vec<&HandoffSnapshot> {
        let mut snapshots: Vec<&HandoffSnapshot> = self.snapshots.values().collect();
        snapshots.sort_by(|a, b| {
            a.record
                .created_at
                .cmp(&b.record.created_at)
                .then_with(|| a.record_id().cmp(b.record_id()))
        });
        snapshots
    }
}

impl HandoffRepository for SnapshotFile {
    fn list(&self, status: Option<HandoffStatus>) -> Result<Vec<HandoffSnapshot>> {
        Ok(self
            .sorted()
            .into_iter()
            .filter(|s| status.map_or(true, |st| s.record.status == st))
            .cloned()
            .collect())
    }

    fn get(&self, record_id: &str) -> Result<Option<HandoffSnapshot>> {
        Ok(self.snapshots.get(record_id).cloned())
    }

    fn upsert(&mut self, record_id: &str, snapshot: &HandoffSnapshot) -> Result<()> {
        if record_id != snapshot.record_id() {
            return Err(HandoffError::Validation(format!(
                "key {} does not match record id {}",
                record_id,
                snapshot.record_id()
            )));
        }
        snapshot.validate()?;
        self.snapshots.insert(record_id.to_string(), snapshot.clone());
        self.dirty = true;
        Ok(())
    }

    fn delete(&mut self, record_id: &str) -> Result<bool> {
        let removed = self.snapshots.remove(record_id).is_some();
        self.dirty |= removed;
        Ok(removed)
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let snapshots: Vec<HandoffSnapshot> = self.sorted().into_iter().cloned().collect();
        let mut temp = NamedTempFile::new_in(&dir)?;
        match self.format {
            FileFormat::JsonArray => {
                let values = encode_all(&snapshots)?;
                serde_json::to_writer_pretty(temp.as_file_mut(), &values)?;
                temp.as_file_mut().write_all(b"\n")?;
            }
            FileFormat::JsonLines => {
                let mut writer = JsonlWriter::new(temp.as_file_mut());
                writer.write_all(&snapshots)?;
                writer.flush()?;
            }
        }
        temp.as_file_mut().sync_all()?;
        temp.persist(&self.path).map_err(|e| HandoffError::Io(e.error))?;

        self.dirty = false;
        tracing::info!(
            path = %self.path.display(),
            count = snapshots.len(),
            "Saved handoff snapshots"
        );
        Ok(())
    }
}

fn read_file(path: &Path, format: FileFormat) -> Result<Vec<HandoffSnapshot>> {
    match format {
        FileFormat::JsonLines => JsonlReader::open(path)?.read_all(),
        FileFormat::JsonArray => {
            let file = File::open(path)?;
            let values: Vec<serde_json::Value> = serde_json::from_reader(file).map_err(|e| {
                HandoffError::Serialization(format!("{}: {}", path.display(), e))
            })?;
            decode_all(values)
        }
    }
}
