//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The engine calls store methods — it never executes SQL directly.

use crate::{
    error::SimResult,
    event::{EventLogEntry, SimEvent},
    types::SnapshotId,
};
use chrono::Utc;
use rusqlite::{params, Connection};

mod profile;
mod reference;
mod snapshot;

pub struct SimStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        if let Err(e) = conn.execute_batch("PRAGMA journal_mode=WAL;") {
            log::warn!("{path}: could not enable WAL journal mode: {e}");
        }
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> SimResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Current journal mode as reported by SQLite ("wal", "memory", ...).
    pub fn journal_mode(&self) -> SimResult<String> {
        Ok(self.conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    /// Delete every row from every table. Used by the sample-data import.
    pub fn clear_all(&self) -> SimResult<()> {
        self.conn.execute_batch(
            "DELETE FROM event_log;
             DELETE FROM snapshot;
             DELETE FROM city_parameter;
             DELETE FROM city_profile;
             DELETE FROM parameter;
             DELETE FROM city;
             DELETE FROM country;",
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &SimEvent) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (snapshot_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.snapshot_id().as_str(),
                event.type_name(),
                serde_json::to_string(event)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_snapshot(&self, snapshot_id: &SnapshotId) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, snapshot_id, event_type, payload, created_at
             FROM event_log WHERE snapshot_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![snapshot_id.as_str()], |row| {
                Ok(EventLogEntry {
                    id:          Some(row.get(0)?),
                    snapshot_id: SnapshotId::from(row.get::<_, String>(1)?),
                    event_type:  row.get(2)?,
                    payload:     row.get(3)?,
                    created_at:  row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Parse an RFC 3339 column back into a UTC timestamp.
fn parse_timestamp(
    column: usize,
    raw: String,
) -> rusqlite::Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Decode a JSON column inside a row mapper.
fn parse_json<T: serde::de::DeserializeOwned>(column: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}
