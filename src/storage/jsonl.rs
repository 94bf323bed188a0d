//! JSONL (JSON Lines) reader and writer for handoff snapshots
//!
//! One snapshot per line. Blank lines are skipped; a malformed line fails the
//! read with its line number.

use super::snapshot::HandoffSnapshot;
use crate::{HandoffError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// JSONL reader for snapshots
pub struct JsonlReader<R = File> {
    reader: BufReader<R>,
}

impl JsonlReader<File> {
    /// Open a JSONL file for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file))
    }
}

impl<R: Read> JsonlReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
        }
    }

    /// Read and validate every snapshot
    pub fn read_all(&mut self) -> Result<Vec<HandoffSnapshot>> {
        let mut snapshots = Vec::new();

        for (index, line) in self.reader.by_ref().lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let snapshot = HandoffSnapshot::from_json(&line).map_err(|e| {
                HandoffError::Serialization(format!("Invalid JSONL at line {}: {}", index + 1, e))
            })?;
            snapshots.push(snapshot);
        }

        Ok(snapshots)
    }
}

/// JSONL writer for snapshots
pub struct JsonlWriter<W: Write = File> {
    writer: BufWriter<W>,
}

impl JsonlWriter<File> {
    /// Create (or truncate) a JSONL file for writing
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    /// Write a single snapshot
    pub fn write(&mut self, snapshot: &HandoffSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    /// Write multiple snapshots
    pub fn write_all(&mut self, snapshots: &[HandoffSnapshot]) -> Result<()> {
        for snapshot in snapshots {
            self.write(snapshot)?;
        }
        Ok(())
    }

    /// Flush the buffer to the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for JsonlWriter<W> {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Read all snapshots from a JSONL file
pub fn read_snapshots(path: impl AsRef<Path>) -> Result<Vec<HandoffSnapshot>> {
    JsonlReader::open(path)?.read_all()
}

/// Write all snapshots to a JSONL file
pub fn write_snapshots(path: impl AsRef<Path>, snapshots: &[HandoffSnapshot]) -> Result<()> {
    let mut writer = JsonlWriter::create(path)?;
    writer.write_all(snapshots)?;
    writer.flush()
}
