//! Narrative analysis — best-effort qualitative summary of a result set.
//!
//! The analyzer sits behind a trait so the engine never depends on how
//! the narrative is produced. Calls go through `run_contained`, which
//! bounds them with a timeout and swaps any failure for a placeholder.

use crate::{
    city::CityProfile,
    error::{SimError, SimResult},
    parameter::ParameterMeta,
    snapshot::Snapshot,
    types::ParameterId,
};
use serde::{Deserialize, Serialize};
use std::{
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterImpact {
    pub parameter_id: Option<ParameterId>,
    pub impact:       String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrativeAnalysis {
    pub summary:               String,
    pub impacts:               Vec<ParameterImpact>,
    pub recommendations:       String,
    pub comparison_to_default: String,
}

impl NarrativeAnalysis {
    pub fn unavailable() -> Self {
        Self {
            summary:               "Analysis temporarily unavailable".into(),
            impacts:               Vec::new(),
            recommendations:       "Please try again later".into(),
            comparison_to_default: "Error generating analysis".into(),
        }
    }

    pub fn insufficient_data() -> Self {
        Self {
            summary:               "Insufficient data for analysis".into(),
            impacts:               Vec::new(),
            recommendations:       "Complete the simulation to get recommendations".into(),
            comparison_to_default: "No simulation data available".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterChange {
    pub parameter_id:   ParameterId,
    pub name:           String,
    pub unit:           String,
    pub base_value:     f64,
    pub final_value:    f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub snapshot_name:     String,
    pub term_count:        usize,
    pub parameter_changes: Vec<ParameterChange>,
    pub initial_health:    f64,
    pub final_health:      f64,
}

impl AnalysisRequest {
    /// Build from the snapshot's first and last results. Returns None when
    /// there are no results. `lookup` resolves parameter metadata; parameters
    /// it cannot resolve, or with a zero baseline, are left out.
    pub fn build<F>(snapshot: &Snapshot, profile: &CityProfile, mut lookup: F) -> Option<Self>
    where
        F: FnMut(&ParameterId) -> Option<ParameterMeta>,
    {
        let first = snapshot.first_result()?;
        let last = snapshot.last_result()?;

        let parameter_changes = last
            .parameters
            .iter()
            .filter_map(|reading| {
                let baseline = profile.baseline(&reading.parameter_id)?;
                if baseline.base_value == 0.0 {
                    return None;
                }
                let meta = lookup(&reading.parameter_id)?;
                Some(ParameterChange {
                    parameter_id:   reading.parameter_id.clone(),
                    name:           meta.name,
                    unit:           meta.unit,
                    base_value:     baseline.base_value,
                    final_value:    reading.value,
                    percent_change: (reading.value / baseline.base_value - 1.0) * 100.0,
                })
            })
            .collect();

        Some(Self {
            snapshot_name: snapshot.name.clone(),
            term_count: snapshot.results.len(),
            parameter_changes,
            initial_health: first.economic_health_score,
            final_health: last.economic_health_score,
        })
    }
}

pub trait NarrativeAnalyzer: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<NarrativeAnalysis>;
}

/// Deterministic, offline analyzer built from the numbers alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateAnalyzer;

impl NarrativeAnalyzer for TemplateAnalyzer {
    fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<NarrativeAnalysis> {
        let delta = request.final_health - request.initial_health;
        let trend = if delta > 0.5 {
            "improved"
        } else if delta < -0.5 {
            "deteriorated"
        } else {
            "held broadly steady"
        };

        let summary = format!(
            "Over {} terms, '{}' {}: economic health moved from {:.2} to {:.2} ({delta:+.2}).",
            request.term_count, request.snapshot_name, trend, request.initial_health, request.final_health,
        );

        let impacts = request
            .parameter_changes
            .iter()
            .map(|c| ParameterImpact {
                parameter_id: Some(c.parameter_id.clone()),
                impact: format!(
                    "{} moved from {} {} to {} {} ({:+.2}%).",
                    c.name, c.base_value, c.unit, c.final_value, c.unit, c.percent_change
                ),
            })
            .collect();

        let biggest = request
            .parameter_changes
            .iter()
            .max_by(|a, b| a.percent_change.abs().total_cmp(&b.percent_change.abs()));
        let recommendations = match biggest {
            Some(c) => format!(
                "- Monitor {} closely; it moved the most ({:+.2}%).\n- Revisit stage rates if the health trend is not the intended one.",
                c.name, c.percent_change
            ),
            None => "- No parameter moved; review the stage growth rates.".into(),
        };

        let comparison_to_default = if delta >= 0.0 {
            "The scenario ends at or above the starting health score.".into()
        } else {
            "The scenario ends below the starting health score.".into()
        };

        Ok(NarrativeAnalysis { summary, impacts, recommendations, comparison_to_default })
    }
}

/// Run the analyzer on a worker thread and wait at most `timeout`.
pub fn try_analyze(
    analyzer: Arc<dyn NarrativeAnalyzer>,
    request: AnalysisRequest,
    timeout: Duration,
) -> SimResult<NarrativeAnalysis> {
    let unavailable = |reason: String| SimError::AnalysisUnavailable { reason };

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("narrative-analysis".into())
        .spawn(move || {
            // The receiver may be gone after a timeout; nothing to do then.
            let _ = tx.send(analyzer.analyze(&request));
        })
        .map_err(|e| unavailable(format!("worker could not start: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(analysis)) => Ok(analysis),
        Ok(Err(e)) => Err(unavailable(format!("{e:#}"))),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(unavailable(format!("timed out after {}ms", timeout.as_millis())))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(unavailable("worker exited without a result".into()))
        }
    }
}

/// Like `try_analyze`, but any failure becomes `NarrativeAnalysis::unavailable()`.
pub fn run_contained(
    analyzer: Arc<dyn NarrativeAnalyzer>,
    request: AnalysisRequest,
    timeout: Duration,
) -> NarrativeAnalysis {
    try_analyze(analyzer, request, timeout).unwrap_or_else(|e| {
        log::warn!("{e}; using placeholder analysis");
        NarrativeAnalysis::unavailable()
    })
}
