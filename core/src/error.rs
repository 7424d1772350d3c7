use crate::types::{SnapshotId, Term};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Term {term} is outside 1..={total_terms}")]
    OutOfRange { term: Term, total_terms: Term },

    #[error("Simulation has reached its end: term {term} exceeds {total_terms} terms")]
    SimulationEnded { term: Term, total_terms: Term },

    #[error("Snapshot '{snapshot_id}' was modified concurrently (expected revision {expected_revision})")]
    ConcurrencyConflict {
        snapshot_id:       SnapshotId,
        expected_revision: u64,
    },

    #[error("Invalid stage plan: {reason}")]
    InvalidStagePlan { reason: String },

    #[error("Analysis unavailable: {reason}")]
    AnalysisUnavailable { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }

    /// Only a lost write race is worth retrying; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

pub type SimResult<T> = Result<T, SimError>;
