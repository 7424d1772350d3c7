//! Trajectory engine — the compounding core.
//!
//! Every term is computed from its predecessor's values (or the city
//! baselines for term 1) and the owning stage's growth rates:
//!
//!   new_value = round2(current_value * (1 + growth_rate / 100))
//!
//! The rounded value is what the next term compounds from, so a full run
//! and a term-by-term advance produce the same numbers.

use crate::{
    city::CityProfile,
    error::{SimError, SimResult},
    health,
    snapshot::{ParameterReading, Snapshot, TermResult},
    stage::{self, Stage},
    types::{round2, ParameterId, Term},
};

/// Per-run table of current parameter values, in profile order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    entries: Vec<(ParameterId, f64)>,
}

impl ValueTable {
    pub fn from_baseline(profile: &CityProfile) -> Self {
        Self {
            entries: profile
                .parameters
                .iter()
                .map(|p| (p.parameter_id.clone(), p.base_value))
                .collect(),
        }
    }

    pub fn from_result(result: &TermResult) -> Self {
        Self {
            entries: result
                .parameters
                .iter()
                .map(|p| (p.parameter_id.clone(), p.value))
                .collect(),
        }
    }

    pub fn get(&self, parameter_id: &ParameterId) -> Option<f64> {
        self.entries
            .iter()
            .find(|(id, _)| id == parameter_id)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute one term from `current`. Returns the term's result and the table
/// the following term must compound from.
pub fn step(
    term: Term,
    stage: &Stage,
    current: &ValueTable,
    profile: &CityProfile,
) -> (TermResult, ValueTable) {
    let mut readings = Vec::with_capacity(current.len());
    let mut next = Vec::with_capacity(current.len());

    for (parameter_id, value) in &current.entries {
        let growth_rate = stage.growth_rate(parameter_id);
        let new_value = round2(value * (1.0 + growth_rate / 100.0));
        readings.push(ParameterReading {
            parameter_id: parameter_id.clone(),
            value: new_value,
            growth_rate,
        });
        next.push((parameter_id.clone(), new_value));
    }

    let economic_health_score = health::score(&readings, profile);
    (
        TermResult { term, parameters: readings, economic_health_score },
        ValueTable { entries: next },
    )
}

/// Full recompute of every term in the plan, starting from the baselines.
pub fn simulate(stages: &[Stage], profile: &CityProfile) -> Vec<TermResult> {
    let mut results = Vec::with_capacity(stage::total_terms(stages) as usize);
    let mut current = ValueTable::from_baseline(profile);
    let mut term: Term = 1;

    for stage in stages {
        for _ in 0..stage.terms {
            let (result, next) = step(term, stage, &current, profile);
            results.push(result);
            current = next;
            term += 1;
        }
    }
    results
}

/// Compute the single result for `term` against the snapshot's stored state.
/// The snapshot itself is not modified.
pub fn advance_term(snapshot: &Snapshot, profile: &CityProfile, term: Term) -> SimResult<TermResult> {
    let position = stage::resolve(&snapshot.stages, term).map_err(|e| match e {
        SimError::OutOfRange { term, total_terms } if term > total_terms => {
            SimError::SimulationEnded { term, total_terms }
        }
        other => other,
    })?;

    let seed = match term.checked_sub(1).and_then(|prev| snapshot.result_for(prev)) {
        Some(previous) => ValueTable::from_result(previous),
        None => ValueTable::from_baseline(profile),
    };

    let (result, _) = step(term, position.stage, &seed, profile);
    Ok(result)
}
