//! Store methods for snapshots.
//!
//! Result writes are a compare-and-swap on `revision`: a writer must name
//! the revision it read, and loses with ConcurrencyConflict if anyone else
//! wrote in between.

use super::{parse_json, parse_timestamp, SimStore};
use crate::{
    analysis::NarrativeAnalysis,
    error::{SimError, SimResult},
    snapshot::{NewSnapshot, Snapshot, TermResult},
    stage,
    types::{CityId, SnapshotId},
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

const SNAPSHOT_COLUMNS: &str = "snapshot_id, name, city_id, created_at, stages_json, results_json,
                                is_completed, analysis_json, revision";

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    let stages: String = row.get(4)?;
    let results: String = row.get(5)?;
    let analysis: Option<String> = row.get(7)?;
    Ok(Snapshot {
        id:           SnapshotId::from(row.get::<_, String>(0)?),
        name:         row.get(1)?,
        city_id:      CityId::from(row.get::<_, String>(2)?),
        created_at:   parse_timestamp(3, row.get(3)?)?,
        stages:       parse_json(4, &stages)?,
        results:      parse_json(5, &results)?,
        is_completed: row.get(6)?,
        ai_analysis:  analysis.map(|a| parse_json(7, &a)).transpose()?,
        revision:     row.get::<_, i64>(8)? as u64,
    })
}

impl SimStore {
    /// Create a snapshot from a validated stage plan. Starts as a draft.
    pub fn insert_snapshot(&self, new: &NewSnapshot) -> SimResult<Snapshot> {
        stage::validate_plan(&new.stages)?;
        self.get_city(&new.city_id)?;

        let snapshot = Snapshot {
            id:           SnapshotId::generate(),
            name:         new.name.clone(),
            city_id:      new.city_id.clone(),
            created_at:   Utc::now(),
            stages:       new.stages.clone(),
            results:      Vec::new(),
            is_completed: false,
            ai_analysis:  None,
            revision:     0,
        };
        self.conn.execute(
            "INSERT INTO snapshot (
                snapshot_id, name, city_id, created_at, stages_json, results_json,
                is_completed, analysis_json, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, '[]', 0, NULL, 0)",
            params![
                snapshot.id.as_str(),
                snapshot.name,
                snapshot.city_id.as_str(),
                snapshot.created_at.to_rfc3339(),
                serde_json::to_string(&snapshot.stages)?,
            ],
        )?;
        Ok(snapshot)
    }

    pub fn get_snapshot(&self, id: &SnapshotId) -> SimResult<Snapshot> {
        self.conn
            .query_row(
                &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshot WHERE snapshot_id = ?1"),
                params![id.as_str()],
                snapshot_from_row,
            )
            .optional()?
            .ok_or_else(|| SimError::not_found("snapshot", id))
    }

    pub fn list_snapshots(&self, city_id: Option<&CityId>) -> SimResult<Vec<Snapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshot
             WHERE ?1 IS NULL OR city_id = ?1
             ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params![city_id.map(|c| c.as_str())], snapshot_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replace the snapshot's results and completion flag if its revision is
    /// still `expected_revision`. Returns the new revision.
    pub fn put_snapshot_results(
        &self,
        id: &SnapshotId,
        results: &[TermResult],
        is_completed: bool,
        expected_revision: u64,
    ) -> SimResult<u64> {
        let changed = self.conn.execute(
            "UPDATE snapshot
             SET results_json = ?1, is_completed = ?2, revision = revision + 1
             WHERE snapshot_id = ?3 AND revision = ?4",
            params![
                serde_json::to_string(results)?,
                is_completed,
                id.as_str(),
                expected_revision as i64,
            ],
        )?;

        if changed == 1 {
            return Ok(expected_revision + 1);
        }

        // Distinguish a vanished snapshot from a lost race.
        self.get_snapshot(id)?;
        log::warn!("snapshot {id}: write lost the race at revision {expected_revision}");
        Err(SimError::ConcurrencyConflict {
            snapshot_id: id.clone(),
            expected_revision,
        })
    }

    /// Write only the analysis column, and only onto the completed run it
    /// describes: if the snapshot moved past `revision` or is no longer
    /// completed, nothing is written and `Ok(false)` is returned.
    pub fn attach_analysis(
        &self,
        id: &SnapshotId,
        analysis: &NarrativeAnalysis,
        revision: u64,
    ) -> SimResult<bool> {
        let changed = self.conn.execute(
            "UPDATE snapshot SET analysis_json = ?1
             WHERE snapshot_id = ?2 AND revision = ?3 AND is_completed = 1",
            params![serde_json::to_string(analysis)?, id.as_str(), revision as i64],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        self.get_snapshot(id)?;
        log::debug!("snapshot {id}: analysis for revision {revision} is stale, not attached");
        Ok(false)
    }
}
