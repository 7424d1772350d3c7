//! Audit events — every state change the engine makes to a snapshot.
//!
//! RULE: The engine records one event per committed write.
//! Variants are only ever appended.

use crate::types::{SnapshotId, Term};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    SnapshotCreated {
        snapshot_id: SnapshotId,
        total_terms: Term,
    },
    SnapshotSimulated {
        snapshot_id: SnapshotId,
        terms:       Term,
        final_health: f64,
    },
    TermAdvanced {
        snapshot_id:  SnapshotId,
        term:         Term,
        health:       f64,
        is_completed: bool,
    },
    AnalysisAttached {
        snapshot_id: SnapshotId,
        placeholder: bool,
    },
}

impl SimEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SnapshotCreated { .. }   => "snapshot_created",
            Self::SnapshotSimulated { .. } => "snapshot_simulated",
            Self::TermAdvanced { .. }      => "term_advanced",
            Self::AnalysisAttached { .. }  => "analysis_attached",
        }
    }

    pub fn snapshot_id(&self) -> &SnapshotId {
        match self {
            Self::SnapshotCreated { snapshot_id, .. }
            | Self::SnapshotSimulated { snapshot_id, .. }
            | Self::TermAdvanced { snapshot_id, .. }
            | Self::AnalysisAttached { snapshot_id, .. } => snapshot_id,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:          Option<i64>,
    pub snapshot_id: SnapshotId,
    pub event_type:  String,
    pub payload:     String, // JSON-serialized SimEvent
    pub created_at:  String,
}
