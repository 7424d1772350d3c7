//! Snapshot — a named multi-stage policy scenario for one city and the
//! per-term results accumulated against it.
//!
//! A snapshot's stage plan is fixed at creation. Results are written by
//! full simulation (wholesale) or by advance (one slot at a time, possibly
//! out of order). `revision` increments on every successful result write.

use crate::{
    analysis::NarrativeAnalysis,
    stage::{self, Stage},
    types::{CityId, GrowthRate, ParameterId, SnapshotId, Term},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterReading {
    pub parameter_id: ParameterId,
    pub value:        f64,
    pub growth_rate:  GrowthRate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermResult {
    pub term:                  Term,
    pub parameters:            Vec<ParameterReading>,
    pub economic_health_score: f64,
}

impl TermResult {
    pub fn value_of(&self, parameter_id: &ParameterId) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| &p.parameter_id == parameter_id)
            .map(|p| p.value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Draft,
    InProgress,
    Completed,
}

/// Input for creating a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub name:    String,
    pub city_id: CityId,
    pub stages:  Vec<Stage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub id:           SnapshotId,
    pub name:         String,
    pub city_id:      CityId,
    pub created_at:   DateTime<Utc>,
    pub stages:       Vec<Stage>,
    /// Ascending by term; may be sparse after out-of-order advances.
    pub results:      Vec<TermResult>,
    pub is_completed: bool,
    pub ai_analysis:  Option<NarrativeAnalysis>,
    pub revision:     u64,
}

impl Snapshot {
    pub fn total_terms(&self) -> Term {
        stage::total_terms(&self.stages)
    }

    /// Lifecycle label. `is_completed` is authoritative for Completed so a
    /// re-advance of an early term moves the label back to InProgress.
    pub fn status(&self) -> SnapshotStatus {
        if self.is_completed {
            SnapshotStatus::Completed
        } else if self.results.is_empty() {
            SnapshotStatus::Draft
        } else {
            SnapshotStatus::InProgress
        }
    }

    pub fn result_for(&self, term: Term) -> Option<&TermResult> {
        self.results
            .binary_search_by_key(&term, |r| r.term)
            .ok()
            .map(|i| &self.results[i])
    }

    /// Store `result` in its term's slot, replacing whatever was there.
    /// Later terms are left as they are.
    pub fn put_result(&mut self, result: TermResult) {
        match self.results.binary_search_by_key(&result.term, |r| r.term) {
            Ok(i)  => self.results[i] = result,
            Err(i) => self.results.insert(i, result),
        }
    }

    pub fn first_result(&self) -> Option<&TermResult> {
        self.results.first()
    }

    pub fn last_result(&self) -> Option<&TermResult> {
        self.results.last()
    }
}
