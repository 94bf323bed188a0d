//! SQLite handoff repository
//!
//! Scalar columns are indexed for the history and metrics queries; the full
//! snapshot is kept as JSON so reads are lossless.

use super::snapshot::HandoffSnapshot;
use super::{HandoffMetrics, HandoffRepository};
use crate::handoff::HandoffStatus;
use crate::{HandoffError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// Which side of a handoff an agent filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentRole {
    /// Sender
    From,
    /// Receiver
    To,
    /// Sender or receiver
    #[default]
    Either,
}

/// Handoff repository backed by a SQLite database
pub struct SqliteHandoffStore {
    conn: Connection,
}

impl SqliteHandoffStore {
    /// Create a store with an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open or create a file-backed database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "Opening handoff database");
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS handoffs (
                id TEXT PRIMARY KEY,
                from_agent TEXT NOT NULL,
                to_agent TEXT NOT NULL,
                status TEXT NOT NULL,
                priority INTEGER NOT NULL,
                created_us INTEGER NOT NULL,
                updated_us INTEGER NOT NULL,
                payload TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_handoffs_status ON handoffs(status);
            CREATE INDEX IF NOT EXISTS idx_handoffs_from ON handoffs(from_agent);
            CREATE INDEX IF NOT EXISTS idx_handoffs_to ON handoffs(to_agent);
            CREATE INDEX IF NOT EXISTS idx_handoffs_updated ON handoffs(updated_us);
            "#,
        )?;
        Ok(())
    }

    /// Records involving `agent_id` in the given role, oldest first
    pub fn by_agent(&self, agent_id: &str, role: AgentRole) -> Result<Vec<HandoffSnapshot>> {
        let sql = match role {
            AgentRole::From => {
                "SELECT payload FROM handoffs WHERE from_agent = ?1 ORDER BY created_us, id"
            }
            AgentRole::To => "SELECT payload FROM handoffs WHERE to_agent = ?1 ORDER BY created_us, id",
            AgentRole::Either => {
                "SELECT payload FROM handoffs WHERE from_agent = ?1 OR to_agent = ?1 ORDER BY created_us, id"
            }
        };
        self.query_payloads(sql, params![agent_id])
    }

    /// Records still waiting for the receiver, oldest first
    pub fn pending(&self) -> Result<Vec<HandoffSnapshot>> {
        self.list(Some(HandoffStatus::Pending))
    }

    /// Most recently updated records first, optionally filtered
    pub fn history(
        &self,
        agent_id: Option<&str>,
        status: Option<HandoffStatus>,
        limit: usize,
    ) -> Result<Vec<HandoffSnapshot>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_payloads(
            r#"
            SELECT payload FROM handoffs
            WHERE (?1 IS NULL OR from_agent = ?1 OR to_agent = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY updated_us DESC, id
            LIMIT ?3
            "#,
            params![agent_id, status.map(|s| s.as_str()), limit],
        )
    }

    fn query_payloads(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<HandoffSnapshot>> {
        let mut stmt = self.conn.prepare(sql)?;
        let payloads = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        payloads.iter().map(|p| HandoffSnapshot::from_json(p)).collect()
    }
}

impl HandoffRepository for SqliteHandoffStore {
    fn list(&self, status: Option<HandoffStatus>) -> Result<Vec<HandoffSnapshot>> {
        self.query_payloads(
            "SELECT payload FROM handoffs WHERE (?1 IS NULL OR status = ?1) ORDER BY created_us, id",
            params![status.map(|s| s.as_str())],
        )
    }

    fn get(&self, record_id: &str) -> Result<Option<HandoffSnapshot>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM handoffs WHERE id = ?1",
                params![record_id],
                |row| row.get(0),
            )
            .optional()?;

        payload.map(|p| HandoffSnapshot::from_json(&p)).transpose()
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

        let record = &snapshot.record;
        let payload = serde_json::to_string(snapshot)?;
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO handoffs
                (id, from_agent, to_agent, status, priority, created_us, updated_us, payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record_id,
                &record.request.from_agent,
                &record.request.to_agent,
                record.status.as_str(),
                record.request.priority.value(),
                record.created_at.timestamp_micros(),
                record.updated_at.timestamp_micros(),
                payload,
            ],
        )?;
        Ok(())
    }

    fn delete(&mut self, record_id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM handoffs WHERE id = ?1", params![record_id])?;
        Ok(removed > 0)
    }

    fn metrics(&self) -> Result<HandoffMetrics> {
        let mut by_status = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM handoffs GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            by_status.insert(status, usize::try_from(count).unwrap_or(0));
        }

        let avg_duration_seconds: Option<f64> = self.conn.query_row(
            "SELECT AVG((updated_us - created_us) / 1000000.0) FROM handoffs
             WHERE status = 'completed' AND updated_us >= created_us",
            [],
            |row| row.get(0),
        )?;

        Ok(HandoffMetrics::from_counts(by_status, avg_duration_seconds))
    }
}

impl std::fmt::Debug for SqliteHandoffStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHandoffStore")
            .field("path", &self.conn.path())
            .finish()
    }
}
